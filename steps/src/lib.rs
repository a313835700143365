/// Parameter values attached to steps.
mod param;
pub use param::{ParamDict, ParamValue};

/// Declarative description of one dock-file generation step.
mod descriptor;
pub use descriptor::{InputSpec, OutputSpec, ParamSpec, ProgramDirs, StepDescriptor, StepKind};

/// Logical file names shared between steps.
pub mod names;

/// Maps one resolved parameter set to an ordered list of step descriptors.
mod catalog;
pub use catalog::generation_steps;

/// Builds the control files and shell commands that realize a step.
mod invoke;
pub use invoke::{invocation, Bindings, BoundFile, Invocation};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Required parameter \"{0}\" is missing")]
    MissingParam(String),
    #[error("Parameter \"{0}\" has the wrong type (expected {1})")]
    WrongParamType(String, &'static str),
    #[error("Step \"{0}\" has no binding for role \"{1}\"")]
    UnboundRole(&'static str, &'static str),
}
