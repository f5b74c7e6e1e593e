//! Compile configuration.
//!
//! One explicit [`CompileOptions`] value is passed into every compile call.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::target::TableEntry;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlatformFamily {
    #[default]
    Web,
    Android,
    Ios,
    Weixin,
    Alipay,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    FunctionCall,
    Markup,
}

/// What the chosen backend needs from the transform passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetCapabilities {
    pub backend: BackendKind,
    /// The runtime can ask whether an outlet was provided while building
    /// nodes. Without it fallback content needs the dual-branch wrapper.
    pub introspects_outlets: bool,
    /// Key numbering restarts inside every loop scope.
    pub scope_local_keys: bool,
    /// Outlet name the default slot is registered under.
    pub default_outlet: &'static str,
}

impl PlatformFamily {
    pub fn backend(self) -> BackendKind {
        match self {
            PlatformFamily::Web | PlatformFamily::Android | PlatformFamily::Ios => {
                BackendKind::FunctionCall
            }
            PlatformFamily::Weixin | PlatformFamily::Alipay => BackendKind::Markup,
        }
    }

    pub fn capabilities(self) -> TargetCapabilities {
        match self.backend() {
            BackendKind::FunctionCall => TargetCapabilities {
                backend: BackendKind::FunctionCall,
                introspects_outlets: true,
                scope_local_keys: false,
                default_outlet: "default",
            },
            BackendKind::Markup => TargetCapabilities {
                backend: BackendKind::Markup,
                introspects_outlets: false,
                scope_local_keys: true,
                default_outlet: "d",
            },
        }
    }

    /// Android and iOS consume typed UTS sources.
    pub fn is_typed(self) -> bool {
        matches!(self, PlatformFamily::Android | PlatformFamily::Ios)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EmissionMode {
    #[default]
    FunctionWrapped,
    StandalonePair,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WhitespaceMode {
    #[default]
    Condense,
    Preserve,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptions {
    pub platform: PlatformFamily,
    pub emission_mode: EmissionMode,
    pub whitespace: WhitespaceMode,
    /// PascalCase component name; names the typed render function.
    pub component_name: String,
    /// Module the helper ABI is imported from.
    pub runtime_module: String,
    /// Module the vnode constructors are imported from (web only).
    pub vnode_module: String,
    pub hoist_static: bool,
    /// Collect codegen errors and return whatever output could be produced.
    pub partial_output: bool,
    /// Static component table, used when no resolver is injected.
    pub components: BTreeMap<String, TableEntry>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            platform: PlatformFamily::default(),
            emission_mode: EmissionMode::default(),
            whitespace: WhitespaceMode::default(),
            component_name: "Template".to_string(),
            runtime_module: "@dcloudio/uni-runtime".to_string(),
            vnode_module: "vue".to_string(),
            hoist_static: false,
            partial_output: false,
            components: BTreeMap::new(),
        }
    }
}

impl CompileOptions {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn for_platform(platform: PlatformFamily) -> Self {
        let emission_mode = match platform.backend() {
            BackendKind::FunctionCall => EmissionMode::FunctionWrapped,
            BackendKind::Markup => EmissionMode::StandalonePair,
        };
        Self {
            platform,
            emission_mode,
            ..Self::default()
        }
    }
}
