use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("roster file could not be read: {0}")]
    Io(#[from] std::io::Error),
    #[error("roster file could not be parsed: {0}")]
    Parse(#[from] toml::de::Error),
}

/// One configured identity: a roll number and the photo to enroll from.
#[derive(Debug, Clone, Deserialize)]
pub struct RosterMember {
    pub roll_no: String,
    pub url: String,
}

/// The static list of known identities.
///
/// Order is preserved all the way into the reference store and therefore
/// into match results. Duplicate roll numbers are allowed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Roster {
    #[serde(default, rename = "member")]
    pub members: Vec<RosterMember>,
}

impl Roster {
    /// Parse a roster from TOML text (`[[member]]` tables).
    pub fn from_toml(text: &str) -> Result<Self, RosterError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a roster file.
    pub fn from_path(path: &Path) -> Result<Self, RosterError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[[member]]
roll_no = "23691A3262"
url = "https://photos.example/23691A3262.jpg"

[[member]]
roll_no = "23691A05G6"
url = "https://photos.example/23691A05G6.jpg"
"#;

    #[test]
    fn test_parse_members_in_order() {
        let roster = Roster::from_toml(SAMPLE).unwrap();
        assert_eq!(roster.members.len(), 2);
        assert_eq!(roster.members[0].roll_no, "23691A3262");
        assert_eq!(roster.members[1].roll_no, "23691A05G6");
    }

    #[test]
    fn test_empty_roster_is_valid() {
        let roster = Roster::from_toml("").unwrap();
        assert!(roster.members.is_empty());
    }

    #[test]
    fn test_missing_url_is_a_parse_error() {
        let err = Roster::from_toml("[[member]]\nroll_no = \"x\"\n").unwrap_err();
        assert!(matches!(err, RosterError::Parse(_)));
    }

    #[test]
    fn test_from_path_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let roster = Roster::from_path(file.path()).unwrap();
        assert_eq!(roster.members.len(), 2);
    }

    #[test]
    fn test_from_path_missing_file_is_io_error() {
        let err = Roster::from_path(Path::new("/nonexistent/roster.toml")).unwrap_err();
        assert!(matches!(err, RosterError::Io(_)));
    }
}
