// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The full rendering pipeline.

use herald_config::model::TemplateConfig;
use herald_core::types::ContactVariables;
use rand::Rng;

use crate::spintax;
use crate::substitution::substitute;
use crate::watermark::WatermarkPolicy;

/// Renders campaign templates into final message text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Renderer {
    watermark: WatermarkPolicy,
}

impl Renderer {
    pub fn new(watermark: WatermarkPolicy) -> Self {
        Self { watermark }
    }

    pub fn from_config(config: &TemplateConfig) -> Self {
        Self::new(WatermarkPolicy::from(config))
    }

    /// Render with the thread-local RNG.
    pub fn render(&self, template: &str, variables: &ContactVariables) -> String {
        self.render_with(template, variables, &mut rand::thread_rng())
    }

    /// Substitute, resolve option groups, then watermark. Watermarking is
    /// always the last step.
    pub fn render_with<R: Rng + ?Sized>(
        &self,
        template: &str,
        variables: &ContactVariables,
        rng: &mut R,
    ) -> String {
        let substituted = substitute(template, variables);
        let resolved = spintax::resolve(&substituted, rng);
        self.watermark.apply(&resolved, rng)
    }

    /// Watermark a text that needs no substitution, such as a test message.
    pub fn watermark_only(&self, text: &str) -> String {
        self.watermark.apply(text, &mut rand::thread_rng())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;

    use super::*;
    use crate::watermark::strip_watermark;

    #[test]
    fn full_pipeline() {
        let mut vars = ContactVariables::new();
        vars.insert("name".into(), json!("Ana"));
        let mut rng = StdRng::seed_from_u64(0);
        let out = Renderer::default().render_with("{Hi|Hello} {{Name}}!", &vars, &mut rng);
        let visible = strip_watermark(&out);
        assert!(visible == "Hi Ana!" || visible == "Hello Ana!", "{visible}");
    }

    #[test]
    fn substituted_values_take_part_in_option_resolution() {
        let mut vars = ContactVariables::new();
        vars.insert("greeting".into(), json!("{Yo|Hey}"));
        let mut rng = StdRng::seed_from_u64(4);
        let visible = strip_watermark(&Renderer::default().render_with(
            "{{greeting}}",
            &vars,
            &mut rng,
        ));
        assert!(visible == "Yo" || visible == "Hey");
    }
}
