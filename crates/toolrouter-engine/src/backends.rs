use std::collections::BTreeMap;

use anyhow::Result;
use serde_json::{json, Map, Value};
use toolrouter_contracts::tools::{
    ToolSpec, TOOL_CANVA, TOOL_OPENAI_IMAGE, TOOL_OPENAI_TEXT, TOOL_VEO3_VIDEO,
};

const CANVA_PREVIEW_URL: &str =
    "https://images.unsplash.com/photo-1611224923853-80b023f02d71?w=400&h=300&fit=crop";
const OPENAI_IMAGE_URL: &str =
    "https://images.unsplash.com/photo-1547036967-23d11aacaee0?w=512&h=512&fit=crop";
const VEO3_THUMBNAIL_URL: &str =
    "https://images.unsplash.com/photo-1536440136628-849c177e76a1?w=400&h=300&fit=crop";
const VEO3_FILE_SIZE: &str = "15.2MB";
const STATUS_COMPLETED: &str = "completed";

pub const GENERIC_BACKEND: &str = "generic";

/// Everything a backend needs to fabricate one response.
#[derive(Debug, Clone, Copy)]
pub struct ToolInvocation<'a> {
    pub prompt: &'a str,
    pub parameters: &'a Map<String, Value>,
    /// Short alphanumeric id for the fabricated asset.
    pub asset_id: &'a str,
}

impl ToolInvocation<'_> {
    fn param(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedOutput {
    pub payload: Map<String, Value>,
    pub final_message: String,
}

pub trait ToolBackend: Send + Sync {
    fn name(&self) -> &str;

    fn synthesize_parameters(&self, spec: &ToolSpec, prompt: &str) -> Map<String, Value> {
        spec.resolve_parameters(prompt)
    }

    fn synthesize_output(&self, invocation: &ToolInvocation<'_>) -> Result<SynthesizedOutput>;
}

/// Backends keyed by tool id. Unknown ids resolve to the generic backend.
#[derive(Default)]
pub struct ToolBackendRegistry {
    backends: BTreeMap<String, Box<dyn ToolBackend>>,
    generic: GenericBackend,
}

impl ToolBackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `backend`, replacing any backend with the same name.
    pub fn register<B: ToolBackend + 'static>(&mut self, backend: B) {
        self.backends
            .insert(backend.name().to_string(), Box::new(backend));
    }

    pub fn get(&self, name: &str) -> Option<&dyn ToolBackend> {
        self.backends.get(name).map(|backend| backend.as_ref())
    }

    pub fn resolve(&self, name: &str) -> &dyn ToolBackend {
        self.get(name).unwrap_or(&self.generic)
    }
}

pub fn default_backend_registry() -> ToolBackendRegistry {
    let mut backends = ToolBackendRegistry::new();
    backends.register(CanvaBackend);
    backends.register(OpenAiImageBackend);
    backends.register(Veo3VideoBackend);
    backends.register(OpenAiTextBackend);
    backends
}

struct CanvaBackend;

impl ToolBackend for CanvaBackend {
    fn name(&self) -> &str {
        TOOL_CANVA
    }

    fn synthesize_output(&self, invocation: &ToolInvocation<'_>) -> Result<SynthesizedOutput> {
        let design_id = format!("canva_design_{}", invocation.asset_id);
        let category = invocation.param("template_category");
        Ok(SynthesizedOutput {
            payload: map_object(json!({
                "design_id": design_id,
                "design_url": format!("https://www.canva.com/design/{design_id}"),
                "preview_url": CANVA_PREVIEW_URL,
                "template_used": category.unwrap_or("professional"),
                "status": STATUS_COMPLETED,
                "editable": true,
            })),
            final_message: format!(
                "✨ Successfully created your design! Your {} has been generated and is ready for use. You can edit it further in Canva or download it directly.",
                category.unwrap_or("design")
            ),
        })
    }
}

struct OpenAiImageBackend;

impl ToolBackend for OpenAiImageBackend {
    fn name(&self) -> &str {
        TOOL_OPENAI_IMAGE
    }

    fn synthesize_output(&self, invocation: &ToolInvocation<'_>) -> Result<SynthesizedOutput> {
        let style = invocation.param("style").unwrap_or("photorealistic");
        Ok(SynthesizedOutput {
            payload: map_object(json!({
                "image_id": format!("img_{}", invocation.asset_id),
                "image_url": OPENAI_IMAGE_URL,
                "prompt_used": invocation.prompt,
                "style": style,
                "resolution": invocation.param("resolution").unwrap_or("1024x1024"),
                "status": STATUS_COMPLETED,
            })),
            final_message: format!(
                "🎨 Your AI-generated image is ready! Created a {style} image based on your description. The image captures the essence of your request with high detail and quality."
            ),
        })
    }
}

struct Veo3VideoBackend;

impl ToolBackend for Veo3VideoBackend {
    fn name(&self) -> &str {
        TOOL_VEO3_VIDEO
    }

    fn synthesize_output(&self, invocation: &ToolInvocation<'_>) -> Result<SynthesizedOutput> {
        let video_id = format!("veo3_{}", invocation.asset_id);
        let duration = invocation.param("duration");
        Ok(SynthesizedOutput {
            payload: map_object(json!({
                "video_id": video_id,
                "video_url": format!("https://example.com/videos/{video_id}.mp4"),
                "thumbnail_url": VEO3_THUMBNAIL_URL,
                "duration": duration.unwrap_or("30s"),
                "quality": invocation.param("quality").unwrap_or("high"),
                "prompt_used": invocation.prompt,
                "status": STATUS_COMPLETED,
                "file_size": VEO3_FILE_SIZE,
            })),
            final_message: format!(
                "🎬 Your AI-generated video is complete! Created a {} video that brings your concept to life with smooth motion and professional quality. Perfect for presentations or social media!",
                duration.unwrap_or("30-second")
            ),
        })
    }
}

struct OpenAiTextBackend;

impl ToolBackend for OpenAiTextBackend {
    fn name(&self) -> &str {
        TOOL_OPENAI_TEXT
    }

    fn synthesize_output(&self, invocation: &ToolInvocation<'_>) -> Result<SynthesizedOutput> {
        let tone = invocation.param("tone").unwrap_or("professional");
        let length = invocation.param("length");
        let text = compose_sample_text(
            invocation.prompt,
            tone,
            length.unwrap_or("medium-length"),
        );
        Ok(SynthesizedOutput {
            payload: map_object(json!({
                "word_count": word_count(&text),
                "text": text,
                "tone": tone,
                "length": length.unwrap_or("medium"),
                "prompt_used": invocation.prompt,
                "status": STATUS_COMPLETED,
            })),
            final_message: format!(
                "📝 Your content has been generated! Created {} content with a {tone} tone. The text is ready to use and can be further customized to meet your specific needs.",
                length.unwrap_or("medium-length")
            ),
        })
    }
}

/// Catch-all branch for tool ids without a dedicated backend.
#[derive(Debug, Default)]
struct GenericBackend;

impl ToolBackend for GenericBackend {
    fn name(&self) -> &str {
        GENERIC_BACKEND
    }

    fn synthesize_output(&self, invocation: &ToolInvocation<'_>) -> Result<SynthesizedOutput> {
        Ok(SynthesizedOutput {
            payload: map_object(json!({
                "message": "Request processed successfully",
                "prompt_used": invocation.prompt,
                "status": STATUS_COMPLETED,
                "fallback": true,
            })),
            final_message: "✅ Your request has been processed! While we couldn't determine a specific tool type, we've prepared a general response to your query.".to_string(),
        })
    }
}

fn compose_sample_text(prompt: &str, tone: &str, length: &str) -> String {
    let lowered = prompt.to_lowercase();
    if lowered.contains("blog") || lowered.contains("article") {
        return "# Understanding the Future of AI

In today's rapidly evolving technological landscape, artificial intelligence continues to reshape how we work, create, and communicate. This transformative technology offers unprecedented opportunities for innovation and efficiency across industries.

The integration of AI tools into everyday workflows has democratized access to powerful capabilities that were once available only to large corporations. From content creation to data analysis, AI empowers individuals and small businesses to compete on a global scale.

As we look toward the future, the key to success lies in understanding how to effectively leverage these tools while maintaining human creativity and oversight. The most successful implementations combine AI efficiency with human insight and strategic thinking."
            .to_string();
    }
    if lowered.contains("email") || lowered.contains("letter") {
        return "Subject: Following up on our conversation

Dear [Name],

I hope this message finds you well. I wanted to follow up on our recent discussion and provide you with the information we talked about.

As promised, I've prepared a comprehensive overview that addresses the key points we covered. I believe this will be valuable for your upcoming project and help move things forward efficiently.

Please let me know if you have any questions or if there's anything else I can assist you with. I look forward to hearing from you soon.

Best regards,
[Your Name]"
            .to_string();
    }
    format!(
        "This is a sample generated text based on your request: \"{prompt}\".

The content has been crafted with a {tone} tone and structured to meet your {length} requirements.

This text demonstrates the type of content that would be generated by an AI text generation service, tailored specifically to your prompt and parameters. The final output would be more detailed and customized based on your exact specifications."
    )
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::{
        default_backend_registry, word_count, SynthesizedOutput, ToolInvocation, GENERIC_BACKEND,
    };

    fn invoke(
        tool: &str,
        prompt: &str,
        parameters: Value,
    ) -> anyhow::Result<SynthesizedOutput> {
        let registry = default_backend_registry();
        let parameters: Map<String, Value> = parameters.as_object().cloned().unwrap_or_default();
        registry.resolve(tool).synthesize_output(&ToolInvocation {
            prompt,
            parameters: &parameters,
            asset_id: "abc123xyz",
        })
    }

    fn keys(payload: &Map<String, Value>) -> Vec<&str> {
        let mut keys: Vec<&str> = payload.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    #[test]
    fn registry_resolves_unknown_tools_to_generic() {
        let registry = default_backend_registry();
        for tool in ["canva", "openai-image", "openai-text", "veo3-video"] {
            assert_eq!(registry.get(tool).map(|backend| backend.name()), Some(tool));
        }
        assert_eq!(registry.resolve("midjourney").name(), GENERIC_BACKEND);
        assert!(registry.get("midjourney").is_none());
    }

    #[test]
    fn canva_payload_carries_design_links() -> anyhow::Result<()> {
        let output = invoke("canva", "Create a logo", json!({"template_category": "logo"}))?;
        assert_eq!(
            keys(&output.payload),
            vec!["design_id", "design_url", "editable", "preview_url", "status", "template_used"]
        );
        assert_eq!(output.payload["design_id"], json!("canva_design_abc123xyz"));
        assert_eq!(
            output.payload["design_url"],
            json!("https://www.canva.com/design/canva_design_abc123xyz")
        );
        assert_eq!(output.payload["template_used"], json!("logo"));
        assert!(output.final_message.contains("Your logo has been generated"));
        Ok(())
    }

    #[test]
    fn canva_defaults_when_category_missing() -> anyhow::Result<()> {
        let output = invoke("canva", "Create a flyer", json!({}))?;
        assert_eq!(output.payload["template_used"], json!("professional"));
        assert!(output.final_message.contains("Your design has been generated"));
        Ok(())
    }

    #[test]
    fn image_payload_defaults_style_and_resolution() -> anyhow::Result<()> {
        let output = invoke("openai-image", "Create a fox", json!({"defaultChoice": true}))?;
        assert_eq!(
            keys(&output.payload),
            vec!["image_id", "image_url", "prompt_used", "resolution", "status", "style"]
        );
        assert_eq!(output.payload["image_id"], json!("img_abc123xyz"));
        assert_eq!(output.payload["style"], json!("photorealistic"));
        assert_eq!(output.payload["resolution"], json!("1024x1024"));
        assert_eq!(output.payload["prompt_used"], json!("Create a fox"));
        Ok(())
    }

    #[test]
    fn video_payload_uses_video_id_in_url() -> anyhow::Result<()> {
        let output = invoke(
            "veo3-video",
            "Generate a clip",
            json!({"duration": "15s", "quality": "high"}),
        )?;
        assert_eq!(
            keys(&output.payload),
            vec![
                "duration",
                "file_size",
                "prompt_used",
                "quality",
                "status",
                "thumbnail_url",
                "video_id",
                "video_url"
            ]
        );
        assert_eq!(
            output.payload["video_url"],
            json!("https://example.com/videos/veo3_abc123xyz.mp4")
        );
        assert_eq!(output.payload["duration"], json!("15s"));
        assert_eq!(output.payload["file_size"], json!("15.2MB"));
        assert!(output.final_message.contains("Created a 15s video"));
        Ok(())
    }

    #[test]
    fn text_payload_counts_words_of_body() -> anyhow::Result<()> {
        let output = invoke(
            "openai-text",
            "write a blog post about AI trends",
            json!({"tone": "professional", "length": "medium"}),
        )?;
        assert_eq!(
            keys(&output.payload),
            vec!["length", "prompt_used", "status", "text", "tone", "word_count"]
        );
        let text = output.payload["text"].as_str().unwrap_or_default();
        assert!(text.starts_with("# Understanding the Future of AI"));
        assert_eq!(output.payload["word_count"], json!(word_count(text)));
        assert_eq!(output.payload["tone"], json!("professional"));
        assert_eq!(output.payload["length"], json!("medium"));
        Ok(())
    }

    #[test]
    fn text_body_follows_prompt_subject() -> anyhow::Result<()> {
        let email = invoke("openai-text", "Write an email to my landlord", json!({}))?;
        let email_text = email.payload["text"].as_str().unwrap_or_default();
        assert!(email_text.starts_with("Subject: Following up"));

        let story = invoke("openai-text", "Write a story", json!({"tone": "creative"}))?;
        let story_text = story.payload["text"].as_str().unwrap_or_default();
        assert!(story_text.contains("\"Write a story\""));
        assert!(story_text.contains("creative tone"));
        assert!(story_text.contains("medium-length requirements"));
        Ok(())
    }

    #[test]
    fn generic_payload_flags_fallback() -> anyhow::Result<()> {
        let output = invoke("midjourney", "Create a thing", json!({}))?;
        assert_eq!(
            keys(&output.payload),
            vec!["fallback", "message", "prompt_used", "status"]
        );
        assert_eq!(output.payload["fallback"], json!(true));
        Ok(())
    }

    #[test]
    fn word_count_ignores_blank_lines() {
        assert_eq!(word_count("one two\n\nthree  four"), 4);
        assert_eq!(word_count(""), 0);
    }
}
