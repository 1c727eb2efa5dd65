use serde::Deserialize;

/// Envelope returned by the template service.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,

    pub data: Option<T>,

    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn into_data(self) -> Result<T, String> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (_, _) => Err(self.error.unwrap_or(self.message)),
        }
    }
}
