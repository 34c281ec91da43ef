use crate::error::LinkError;

/// Outcome of a liveness check. Failures are reported here instead of
/// being returned as `Err`.
#[derive(Debug)]
pub struct PingResult {
    pub success: bool,
    pub error: Option<LinkError>,
}

impl PingResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: LinkError) -> Self {
        Self {
            success: false,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}
