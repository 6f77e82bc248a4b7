use crate::config::parse::{parse_initial_timestamp, parse_positive_integer};
use crate::config::probe::ResourceProbe;
use crate::config::types::*;
use tracing::{error, info};

/// Outcome of validating runtime properties
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// One diagnostic per failed check
    pub failures: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, message: String) {
        error!("{}", message);
        self.failures.push(message);
    }
}

/// Validates the flat runtime parameters before the pipeline starts.
///
/// Every check runs regardless of earlier failures so that one pass reports
/// every problem. Probe errors count as a failed existence check.
pub struct PropertyValidator<'a> {
    probe: &'a dyn ResourceProbe,
}

impl<'a> PropertyValidator<'a> {
    pub fn new(probe: &'a dyn ResourceProbe) -> Self {
        Self { probe }
    }

    pub async fn validate(&self, properties: &Properties) -> ValidationReport {
        let mut report = ValidationReport::default();
        let get = |key: &str| properties.get(key).map(String::as_str);

        info!("Printing runtime properties");
        for (key, value) in properties {
            info!(parameter = %key, value = %value, "Runtime property");
        }

        let region = get(REGION).unwrap_or_default();

        let (destination_ok, source_ok) = tokio::join!(
            self.check_destination(region, get(S3_OUTPUT_PATH)),
            self.check_source(region, get(INPUT_STREAM_NAME)),
        );
        if let Err(message) = destination_ok {
            report.fail(message);
        }
        if let Err(message) = source_ok {
            report.fail(message);
        }

        if parse_positive_integer(get(SESSION_TIME_OUT_IN_MINUTES)).is_none() {
            report.fail(format!(
                "Value for property '{}' is invalid: {:?} (expected a positive integer)",
                SESSION_TIME_OUT_IN_MINUTES,
                get(SESSION_TIME_OUT_IN_MINUTES)
            ));
        }

        let position = get(STREAM_INIT_POSITION).map(|v| v.parse::<StreamPosition>());
        match &position {
            Some(Ok(_)) => {}
            Some(Err(e)) => report.fail(format!("Value for property '{}' is invalid: {}", STREAM_INIT_POSITION, e)),
            None => report.fail(format!("Property '{}' is not provided", STREAM_INIT_POSITION)),
        }

        if matches!(position, Some(Ok(StreamPosition::AtTimestamp))) {
            match get(STREAM_INITIAL_TIMESTAMP) {
                Some(raw) if parse_initial_timestamp(raw).is_some() => {}
                Some(raw) => report.fail(format!(
                    "Value for property '{}' is not a valid date/time: {}",
                    STREAM_INITIAL_TIMESTAMP, raw
                )),
                None => report.fail(format!(
                    "{} is set to 'AT_TIMESTAMP' but '{}' is not provided",
                    STREAM_INIT_POSITION, STREAM_INITIAL_TIMESTAMP
                )),
            }
        }

        if report.is_valid() {
            info!("Runtime properties are valid");
            if let Some(Ok(position)) = position {
                info!(position = %position, "Will consume data from stream position");
                if position == StreamPosition::AtTimestamp {
                    info!(
                        initial_timestamp = get(STREAM_INITIAL_TIMESTAMP).unwrap_or_default(),
                        "Initial stream timestamp set"
                    );
                }
            }
        } else {
            error!(failures = report.failures.len(), "Runtime properties are not valid");
        }

        report
    }

    async fn check_destination(&self, region: &str, path: Option<&str>) -> Result<(), String> {
        let Some(path) = path.filter(|p| !p.trim().is_empty()) else {
            return Err(format!("Property '{}' is not provided", S3_OUTPUT_PATH));
        };
        match self.probe.destination_writable(region, path).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(format!(
                "The specified output location '{}' does not exist or is not writable",
                path
            )),
            Err(e) => Err(format!(
                "The specified output location '{}' could not be checked: {}",
                path, e
            )),
        }
    }

    async fn check_source(&self, region: &str, stream_name: Option<&str>) -> Result<(), String> {
        let Some(stream_name) = stream_name.filter(|s| !s.trim().is_empty()) else {
            return Err(format!("Property '{}' is not provided", INPUT_STREAM_NAME));
        };
        match self.probe.source_readable(region, stream_name).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(format!(
                "The specified input stream '{}' does not exist or is not readable",
                stream_name
            )),
            Err(e) => Err(format!(
                "The specified input stream '{}' could not be checked: {}",
                stream_name, e
            )),
        }
    }
}
