//! Script generation: prompt rendering, cache lookup and completion.

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

use crate::core::prompt::render_prompt;
use crate::core::types::{CompletionRequest, ScriptSpecification};
use crate::io::cache::Cache;
use crate::io::completion::Completer;

/// Stop sequence ending a script at a closing code fence.
pub const SCRIPT_STOP: &str = "\n```";

pub struct ScriptGenerator<C> {
    completer: C,
    cache: Cache,
    model: String,
    max_tokens: u32,
}

impl<C: Completer> ScriptGenerator<C> {
    pub fn new(completer: C, cache: Cache, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            completer,
            cache,
            model: model.into(),
            max_tokens,
        }
    }

    pub fn completer(&self) -> &C {
        &self.completer
    }

    /// The completion request sent for `spec`.
    pub fn request_for(&self, spec: &ScriptSpecification) -> CompletionRequest {
        let (prompt, suffix) = render_prompt(spec);
        CompletionRequest {
            suffix: Some(suffix),
            stop: vec![SCRIPT_STOP.to_string()],
            ..CompletionRequest::new(&self.model, prompt, self.max_tokens)
        }
    }

    /// Generate the script text for `spec`, reusing a cached completion when
    /// the identical request was made before.
    #[instrument(skip_all, fields(lang = %spec.lang, model = %self.model))]
    pub fn generate(&self, spec: &ScriptSpecification) -> Result<String> {
        let request = self.request_for(spec);
        let response = self
            .cache
            .load_or_compute(&request, |request| self.completer.complete(request))
            .context("request completion")?;
        let text = response
            .first_text()
            .ok_or_else(|| anyhow!("completion response contained no choices"))?;
        debug!(chars = text.len(), "script generated");
        Ok(text.to_string())
    }
}
