use std::process::Command;

use crate::app::{Error, Result};

/// Resolution order per spec: configured user+password, then a password
/// file (first line), then a password command (first line of stdout).
/// Interactive prompting is left to the caller.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub user: Option<String>,
    pub password: Option<String>,
    pub password_file: Option<String>,
    pub password_command: Option<String>,
}

impl Credentials {
    pub fn resolve(&self) -> Result<(String, String)> {
        let user = self
            .user
            .clone()
            .ok_or_else(|| Error::Auth("no user configured for remote backend".into()))?;

        if let Some(password) = &self.password {
            return Ok((user, password.clone()));
        }

        if let Some(path) = &self.password_file {
            let contents = std::fs::read_to_string(path)?;
            let password = contents.lines().next().unwrap_or("").to_string();
            return Ok((user, password));
        }

        if let Some(cmd) = &self.password_command {
            let output = Command::new("/bin/sh").arg("-c").arg(cmd).output()?;
            if !output.status.success() {
                return Err(Error::Auth(format!("password-command `{cmd}` exited with {}", output.status)));
            }
            let stdout = String::from_utf8_lossy(&output.stdout);
            let password = stdout.lines().next().unwrap_or("").to_string();
            return Ok((user, password));
        }

        Err(Error::Auth("no password source configured for remote backend".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_from_configured_password() {
        let creds = Credentials {
            user: Some("alice".into()),
            password: Some("hunter2".into()),
            ..Default::default()
        };
        assert_eq!(creds.resolve().unwrap(), ("alice".to_string(), "hunter2".to_string()));
    }

    #[test]
    fn resolves_from_password_file_first_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pw.txt");
        std::fs::write(&path, "s3cret\nignored-second-line\n").unwrap();

        let creds = Credentials {
            user: Some("alice".into()),
            password_file: Some(path.to_string_lossy().to_string()),
            ..Default::default()
        };
        assert_eq!(creds.resolve().unwrap().1, "s3cret");
    }

    #[test]
    fn resolves_from_password_command_first_line() {
        let creds = Credentials {
            user: Some("alice".into()),
            password_command: Some("printf 'cmd-secret\\nother'".into()),
            ..Default::default()
        };
        assert_eq!(creds.resolve().unwrap().1, "cmd-secret");
    }

    #[test]
    fn fails_without_any_password_source() {
        let creds = Credentials { user: Some("alice".into()), ..Default::default() };
        assert!(creds.resolve().is_err());
    }

    #[test]
    fn fails_without_user() {
        let creds = Credentials { password: Some("x".into()), ..Default::default() };
        assert!(creds.resolve().is_err());
    }
}
