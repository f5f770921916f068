//! External programs run as macro steps.

use std::process::Stdio;

use anyhow::Result;
use tokio::process::Command;

use crate::domain::errors::ChoiceError;
use crate::domain::model::Variables;

const VARIABLE_ENV_PREFIX: &str = "QUICKCHOICE_VAR_";

/// Run `program` with `args`, exposing every bound variable as `QUICKCHOICE_VAR_<NAME>`.
///
/// Returns the program's stdout with surrounding whitespace trimmed.
pub async fn run_script(program: &str, args: &[String], variables: &Variables) -> Result<String> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .envs(variables.iter().map(|(name, value)| (env_name(name), value)))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = cmd.output().await.map_err(|err| {
        ChoiceError::ExternalRequest(format!("failed to spawn script '{program}': {err}"))
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ChoiceError::ExternalRequest(format!(
            "script '{program}' exited with {}: {}",
            output.status,
            stderr.trim()
        ))
        .into());
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn env_name(variable: &str) -> String {
    let sanitized: String = variable
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{VARIABLE_ENV_PREFIX}{sanitized}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_names_become_env_keys() {
        assert_eq!(env_name("value"), "QUICKCHOICE_VAR_VALUE");
        assert_eq!(env_name("template-path"), "QUICKCHOICE_VAR_TEMPLATE_PATH");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_trimmed_stdout_and_sees_variables() -> Result<()> {
        let mut variables = Variables::new();
        variables.insert("value".into(), "hello".into());
        let args = vec!["-c".to_string(), "echo \"  $QUICKCHOICE_VAR_VALUE  \"".to_string()];
        assert_eq!(run_script("sh", &args, &variables).await?, "hello");
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_an_external_failure() {
        let args = vec!["-c".to_string(), "echo broken >&2; exit 3".to_string()];
        let err = run_script("sh", &args, &Variables::new()).await.unwrap_err();
        match err.downcast_ref::<ChoiceError>() {
            Some(ChoiceError::ExternalRequest(message)) => assert!(message.contains("broken")),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
