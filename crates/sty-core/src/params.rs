use thiserror::Error;
use tracing::warn;

pub const DEFAULT_STRENGTH: f32 = 0.5;
pub const DEFAULT_INFERENCE_STEPS: u32 = 30;
pub const DEFAULT_GUIDANCE_SCALE: f32 = 7.5;

/// Substituted when the caller gives no negative prompt
pub const DEFAULT_NEGATIVE_PROMPT: &str = "blurry, low quality, low resolution, out of focus, \
    bad anatomy, extra limbs, poorly drawn face, deformed eyes, unbalanced lighting, noisy, \
    jpeg artifacts, double face, mutated hands, grainy, text, watermark";

pub const MATCH_INPUT_IMAGE: &str = "match_input_image";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("`prompt` is required")]
    MissingPrompt,
    #[error(
        "Invalid aspect_ratio '{0}'. Supported formats: '16:9', '1:1', '9:16', '4:3', '3:4', \
         etc. or 'match_input_image' to match the input image aspect ratio"
    )]
    InvalidAspectRatio(String),
}

/// Parameters for the style-transfer model.
///
/// Ranges are clamped once here; consumers read the fields as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleParams {
    prompt: String,
    negative_prompt: Option<String>,
    strength: f32,
    inference_steps: u32,
    guidance_scale: f32,
    seed: Option<i64>,
}

impl StyleParams {
    /// Params with every optional field at its default
    pub fn new(prompt: impl Into<String>) -> Result<Self, ParamError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(ParamError::MissingPrompt);
        }

        Ok(Self {
            prompt,
            negative_prompt: None,
            strength: DEFAULT_STRENGTH,
            inference_steps: DEFAULT_INFERENCE_STEPS,
            guidance_scale: DEFAULT_GUIDANCE_SCALE,
            seed: None,
        })
    }

    pub fn with_negative_prompt(mut self, negative_prompt: Option<String>) -> Self {
        self.negative_prompt = negative_prompt.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = clamp_real(strength, 0.0, 1.0, DEFAULT_STRENGTH);
        self
    }

    pub fn with_inference_steps(mut self, steps: u32) -> Self {
        self.inference_steps = steps.clamp(1, 100);
        self
    }

    pub fn with_guidance_scale(mut self, guidance_scale: f32) -> Self {
        self.guidance_scale = clamp_real(guidance_scale, 1.0, 20.0, DEFAULT_GUIDANCE_SCALE);
        self
    }

    pub fn with_seed(mut self, seed: Option<i64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn negative_prompt(&self) -> Option<&str> {
        self.negative_prompt.as_deref()
    }

    /// Negative prompt with the default substituted
    pub fn effective_negative_prompt(&self) -> &str {
        self.negative_prompt().unwrap_or(DEFAULT_NEGATIVE_PROMPT)
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }

    pub fn inference_steps(&self) -> u32 {
        self.inference_steps
    }

    pub fn guidance_scale(&self) -> f32 {
        self.guidance_scale
    }

    pub fn seed(&self) -> Option<i64> {
        self.seed
    }
}

fn clamp_real(value: f32, min: f32, max: f32, default: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        default
    }
}

/// Output aspect ratio requested from the flux model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectRatio {
    #[default]
    MatchInputImage,
    Ratio(u32, u32),
}

impl AspectRatio {
    /// Accepts `"<int>:<int>"` or `"match_input_image"`
    pub fn parse(value: &str) -> Result<Self, ParamError> {
        let value = value.trim();
        if value == MATCH_INPUT_IMAGE {
            return Ok(Self::MatchInputImage);
        }

        let invalid = || ParamError::InvalidAspectRatio(value.to_string());
        let (w, h) = value.split_once(':').ok_or_else(invalid)?;
        let w: u32 = w.parse().map_err(|_| invalid())?;
        let h: u32 = h.parse().map_err(|_| invalid())?;

        Ok(Self::Ratio(w, h))
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MatchInputImage => f.write_str(MATCH_INPUT_IMAGE),
            Self::Ratio(w, h) => write!(f, "{w}:{h}"),
        }
    }
}

impl std::str::FromStr for AspectRatio {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Parameters for the flux model
#[derive(Debug, Clone, PartialEq)]
pub struct FluxParams {
    prompt: String,
    aspect_ratio: AspectRatio,
}

impl FluxParams {
    pub fn new(prompt: impl Into<String>, aspect_ratio: AspectRatio) -> Result<Self, ParamError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(ParamError::MissingPrompt);
        }

        Ok(Self { prompt, aspect_ratio })
    }

    /// Take the aspect ratio as free text, falling back to `match_input_image`
    /// when it does not parse
    pub fn with_aspect_ratio_lossy(mut self, value: &str) -> Self {
        self.aspect_ratio = match AspectRatio::parse(value) {
            Ok(aspect_ratio) => aspect_ratio,
            Err(e) => {
                warn!("{e}. Using {MATCH_INPUT_IMAGE}");
                AspectRatio::MatchInputImage
            }
        };
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        self.aspect_ratio
    }
}
