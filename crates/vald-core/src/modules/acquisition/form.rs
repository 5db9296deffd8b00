use super::config::AcquisitionConfig;
use super::model::ExtractionRequest;
use crate::domain::{ValdError, ValdResult};
use crate::modules::traits::ExtractionForm;
use std::ffi::OsString;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Fills in the VALD "Extract All" form by running a browser-automation helper.
#[derive(Debug, Clone)]
pub struct CommandExtractionForm {
    config: AcquisitionConfig,
}

impl CommandExtractionForm {
    pub fn new(config: &AcquisitionConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn helper(&self) -> &Path {
        &self.config.form_helper
    }

    pub fn arguments(&self, request: &ExtractionRequest) -> Vec<OsString> {
        let mut arguments: Vec<OsString> = vec![
            "--server".into(),
            self.config.server.as_str().into(),
            "--email".into(),
            self.config.email.clone().into(),
            "--start".into(),
            request.range.start.to_string().into(),
            "--end".into(),
            request.range.end.to_string().into(),
            "--format".into(),
            self.config.extraction_format.as_str().into(),
            "--retrieval".into(),
            self.config.data_retrieval.as_str().into(),
            "--config".into(),
            self.config.linelist_config.as_str().into(),
            "--comment".into(),
            request.comment.clone().into(),
        ];
        if let Some(driver) = &self.config.web_driver {
            arguments.push("--driver".into());
            arguments.push(driver.clone().into_os_string());
        }
        if self.config.show_browser {
            arguments.push("--show-browser".into());
        }
        arguments
    }
}

impl ExtractionForm for CommandExtractionForm {
    fn submit(&mut self, request: &ExtractionRequest) -> ValdResult<()> {
        debug!(
            helper = %self.helper().display(),
            index = request.index,
            range = %request.range,
            "submitting extraction form"
        );
        let output = Command::new(self.helper())
            .args(self.arguments(request))
            .output()
            .map_err(|source| {
                ValdError::external_tool(
                    "ACQUIRE.FORM_SPAWN",
                    format!("failed to start form helper '{}': {}", self.helper().display(), source),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ValdError::external_tool(
                "ACQUIRE.FORM_SUBMIT",
                format!(
                    "form helper '{}' failed with {}: {}",
                    self.helper().display(),
                    output.status,
                    stderr.trim()
                ),
            ));
        }
        Ok(())
    }
}
