//! Compilation options and target description.

use serde::{Deserialize, Serialize};

/// Target instruction set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Architecture {
    #[default]
    X64,
    Arm64,
    X86,
    Arm,
}

impl Architecture {
    pub fn pointer_size(self) -> u8 {
        match self {
            Self::X64 | Self::Arm64 => 8,
            Self::X86 | Self::Arm => 4,
        }
    }
}

/// What the emission layer needs to know about the target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TargetDetails {
    pub architecture: Architecture,
}

impl TargetDetails {
    pub fn new(architecture: Architecture) -> Self {
        Self { architecture }
    }

    #[inline]
    pub fn pointer_size(&self) -> u8 {
        self.architecture.pointer_size()
    }
}

/// How vtables are populated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VTablePolicy {
    /// Only slots whose virtual method is used somewhere get emitted.
    #[default]
    Lazy,
    /// Every virtual method gets a slot, used or not.
    Full,
}

/// Options for one compilation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CompilationOptions {
    pub target: TargetDetails,
    pub vtable_policy: VTablePolicy,
    /// Generic type handles and method dictionaries may live in another
    /// module, so dictionary slots use conditionally-indirect references.
    pub cross_module_generics: bool,
}

impl CompilationOptions {
    /// Parse options from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_target(mut self, architecture: Architecture) -> Self {
        self.target = TargetDetails::new(architecture);
        self
    }

    pub fn with_vtable_policy(mut self, policy: VTablePolicy) -> Self {
        self.vtable_policy = policy;
        self
    }

    pub fn with_cross_module_generics(mut self, enabled: bool) -> Self {
        self.cross_module_generics = enabled;
        self
    }
}
