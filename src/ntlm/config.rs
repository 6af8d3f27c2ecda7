/// Client-side inputs of the fallback negotiation. Domain and workstation are
/// advertised in the initial message when present; `connectionless` marks a
/// datagram transport and is reflected in the capability flags.
#[derive(Debug, Clone, Default)]
pub struct NtlmConfig {
    pub domain: Option<String>,
    pub workstation: Option<String>,
    pub connectionless: bool,
}

impl NtlmConfig {
    pub fn new(workstation: String) -> Self {
        Self {
            domain: None,
            workstation: Some(workstation),
            connectionless: false,
        }
    }
}
