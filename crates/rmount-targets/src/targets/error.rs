use std::fmt;
use std::io;
use uuid::Uuid;

#[derive(Debug)]
pub enum RegistryError {
    Io(String),
    Serialization(String),
    /// Host or username empty, or port zero.
    InvalidTarget(String),
    DuplicateId(Uuid),
    NotFound(Uuid),
    AlreadyMounted { id: Uuid, mount: String },
    Credential(String),
    /// No per-user configuration directory on this platform.
    NoConfigDir,
}

pub type RegistryResult<T> = Result<T, RegistryError>;

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "Registry I/O error: {}", msg),
            Self::Serialization(msg) => write!(f, "Registry serialization error: {}", msg),
            Self::InvalidTarget(msg) => write!(f, "Invalid target: {}", msg),
            Self::DuplicateId(id) => write!(f, "Target {} already exists", id),
            Self::NotFound(id) => write!(f, "Target {} not found", id),
            Self::AlreadyMounted { id, mount } => {
                write!(f, "Target {} is already mounted as {}", id, mount)
            }
            Self::Credential(msg) => write!(f, "Credential store error: {}", msg),
            Self::NoConfigDir => write!(f, "No configuration directory available"),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<io::Error> for RegistryError {
    fn from(e: io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let id = Uuid::nil();
        assert_eq!(
            RegistryError::NotFound(id).to_string(),
            "Target 00000000-0000-0000-0000-000000000000 not found"
        );
        let e = RegistryError::AlreadyMounted {
            id,
            mount: "m1".into(),
        };
        assert!(e.to_string().ends_with("mounted as m1"));
    }

    #[test]
    fn test_from_serde_json() {
        let err = serde_json::from_str::<Vec<u8>>("{").unwrap_err();
        assert!(matches!(RegistryError::from(err), RegistryError::Serialization(_)));
    }
}
