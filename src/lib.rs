//! # uni-template-compiler
//!
//! Compiles one UI template into either a vnode render function (web,
//! android, ios) or mini-program markup plus a binding function (weixin,
//! alipay).
//!
//! ## Pipeline Invariants
//!
//! 1. **Lowering is total or fails**: a template either lowers into a
//!    complete [`TemplateNode`] tree or produces one [`ParseError`]. No partial
//!    trees reach codegen.
//!
//! 2. **Passes annotate, backends read**: slot resolution and binding
//!    extraction are the only passes that mutate the tree. Backends see it
//!    frozen.
//!
//! 3. **Keys follow document order**: binding keys are assigned in pre-order,
//!    a group or loop before its contents. Compiling the same template twice
//!    yields byte-identical output.
//!
//! 4. **Helpers go through the ABI**: generated code reaches the runtime only
//!    through [`helpers::HELPER_ABI`], imported under its aliases.
//!
//! 5. **Nothing is dropped silently**: an unsupported directive or a
//!    construct the target cannot express is a [`CodegenError`] with its node
//!    path.

pub mod ast;
pub mod binding;
pub mod cache;
pub mod codegen;
pub mod compile;
pub mod error;
pub mod eval;
pub mod expression;
pub mod helpers;
pub mod markup;
pub mod options;
pub mod parse;
pub mod slots;
pub mod target;
pub mod visitor;

#[cfg(test)]
mod codegen_tests;
#[cfg(test)]
mod slot_tests;

pub use ast::{NodePath, SourceLocation, TemplateNode};
pub use binding::{BindingKey, CodegenContext};
pub use cache::CompileCache;
pub use compile::{compile, compile_many, compile_with_table};
pub use error::{CodegenError, CompileError, EvalError, ParseError};
pub use helpers::{Helper, HELPER_ABI, HELPER_ABI_VERSION};
pub use options::{CompileOptions, EmissionMode, PlatformFamily, WhitespaceMode};
pub use target::{
    CompileOutput, CompileResult, ComponentResolver, NoopResolver, ResolvedComponent,
    TableEntry, TableResolver,
};

#[cfg(feature = "napi")]
pub use compile::compile_template_native;
