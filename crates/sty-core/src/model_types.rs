/// Remote models the service can style an image with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleModel {
    StyleTransfer,
    Flux,
}

impl StyleModel {
    /// Model name for display and logs
    pub fn name(&self) -> &str {
        match self {
            Self::StyleTransfer => "Style Transfer",
            Self::Flux => "Flux Kontext Pro",
        }
    }

    /// Short stable id
    pub fn id(&self) -> &str {
        match self {
            Self::StyleTransfer => "style_transfer",
            Self::Flux => "flux",
        }
    }

    /// Versioned model identifier sent to the prediction API
    pub fn version(&self) -> &str {
        match self {
            Self::StyleTransfer => "15a3689ee13b0d2616e98820eca31d4c3abcd36672df6afce5cb6feb1d66087d",
            Self::Flux => "black-forest-labs/flux-kontext-pro",
        }
    }

    /// Bounding box the input is fit into before upload.
    /// Flux works better with higher resolution input.
    pub fn working_bound(&self) -> (u32, u32) {
        match self {
            Self::StyleTransfer => (768, 768),
            Self::Flux => (1024, 1024),
        }
    }

    /// Path of the inbound route, relative to the service root
    pub fn route(&self) -> &str {
        match self {
            Self::StyleTransfer => "api/style",
            Self::Flux => "api/style-flux",
        }
    }

    /// All available models
    pub fn all() -> [StyleModel; 2] {
        [Self::StyleTransfer, Self::Flux]
    }
}

impl Default for StyleModel {
    fn default() -> Self {
        Self::StyleTransfer
    }
}

impl std::fmt::Display for StyleModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
