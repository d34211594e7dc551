//! Argument types for the project tools.

use serde::{Deserialize, Serialize};

/// Kind of POU to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PouType {
    Program,
    FunctionBlock,
    Function,
}

impl PouType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Program => "Program",
            Self::FunctionBlock => "FunctionBlock",
            Self::Function => "Function",
        }
    }
}

/// Implementation language requested for a new POU.
///
/// Short and long spellings are both accepted. The scripting API picks the
/// CODESYS default language, so the value is recorded but not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImplementationLanguage {
    #[serde(rename = "ST")]
    St,
    #[serde(rename = "LD")]
    Ld,
    #[serde(rename = "FBD")]
    Fbd,
    #[serde(rename = "SFC")]
    Sfc,
    #[serde(rename = "IL")]
    Il,
    #[serde(rename = "CFC")]
    Cfc,
    StructuredText,
    LadderDiagram,
    FunctionBlockDiagram,
    SequentialFunctionChart,
    InstructionList,
    ContinuousFunctionChart,
}

impl ImplementationLanguage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::St => "ST",
            Self::Ld => "LD",
            Self::Fbd => "FBD",
            Self::Sfc => "SFC",
            Self::Il => "IL",
            Self::Cfc => "CFC",
            Self::StructuredText => "StructuredText",
            Self::LadderDiagram => "LadderDiagram",
            Self::FunctionBlockDiagram => "FunctionBlockDiagram",
            Self::SequentialFunctionChart => "SequentialFunctionChart",
            Self::InstructionList => "InstructionList",
            Self::ContinuousFunctionChart => "ContinuousFunctionChart",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckStatusArgs {}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFileArgs {
    pub file_path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveProjectArgs {
    pub project_file_path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePouArgs {
    pub project_file_path: String,
    pub name: String,
    #[serde(rename = "type")]
    pub pou_type: PouType,
    pub language: ImplementationLanguage,
    pub parent_path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPouCodeArgs {
    pub project_file_path: String,
    pub pou_path: String,
    /// `None` leaves the declaration unchanged.
    #[serde(default)]
    pub declaration_code: Option<String>,
    /// `None` leaves the implementation unchanged.
    #[serde(default)]
    pub implementation_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePropertyArgs {
    pub project_file_path: String,
    pub parent_pou_path: String,
    pub property_name: String,
    pub property_type: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMethodArgs {
    pub project_file_path: String,
    pub parent_pou_path: String,
    pub method_name: String,
    /// Empty or absent creates a method without a return value.
    #[serde(default)]
    pub return_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPathArgs {
    pub project_path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PouCodeArgs {
    pub project_path: String,
    pub pou_path: String,
}

/// One tool call, tagged by tool name with its arguments alongside.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "tool", content = "arguments", rename_all = "snake_case")]
pub enum ToolRequest {
    CheckStatus(CheckStatusArgs),
    OpenProject(ProjectFileArgs),
    CreateProject(ProjectFileArgs),
    SaveProject(SaveProjectArgs),
    CreatePou(CreatePouArgs),
    SetPouCode(SetPouCodeArgs),
    CreateProperty(CreatePropertyArgs),
    CreateMethod(CreateMethodArgs),
    CompileProject(SaveProjectArgs),
    GetProjectStructure(ProjectPathArgs),
    GetPouCode(PouCodeArgs),
}

/// Every tool name [`ToolRequest`] accepts.
pub const TOOL_NAMES: &[&str] = &[
    "check_status",
    "open_project",
    "create_project",
    "save_project",
    "create_pou",
    "set_pou_code",
    "create_property",
    "create_method",
    "compile_project",
    "get_project_structure",
    "get_pou_code",
];

impl ToolRequest {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CheckStatus(_) => "check_status",
            Self::OpenProject(_) => "open_project",
            Self::CreateProject(_) => "create_project",
            Self::SaveProject(_) => "save_project",
            Self::CreatePou(_) => "create_pou",
            Self::SetPouCode(_) => "set_pou_code",
            Self::CreateProperty(_) => "create_property",
            Self::CreateMethod(_) => "create_method",
            Self::CompileProject(_) => "compile_project",
            Self::GetProjectStructure(_) => "get_project_structure",
            Self::GetPouCode(_) => "get_pou_code",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
