//! Project operations built on the script invoker.
//!
//! Each tool composes script templates, fills in its parameters, runs the
//! result through [`ScriptInvoker`] and turns the verdict into a
//! [`ToolOutput`]. A tool only counts as successful when the invocation
//! succeeded *and* the script printed its success marker.

pub mod locate;
pub mod params;
pub mod parse;

use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::config::BridgeConfig;
use crate::error::CoreError;
use crate::scripting::executor::{InvocationResult, ProcessRunner, ScriptInvoker};
use crate::scripting::subprocess::SystemProcessRunner;
use crate::scripting::SCRIPT_SUCCESS_MARKER;
use crate::templates::{self, TemplateStore};

pub use params::{ImplementationLanguage, PouType, ToolRequest, TOOL_NAMES};

use params::{
    CreateMethodArgs, CreatePouArgs, CreatePropertyArgs, PouCodeArgs, SetPouCodeArgs,
};

/// Prelude that opens the target project.
const ENSURE_PROJECT_OPEN: &str = "ensure_project_open";
/// Prelude that resolves `Application/Folder/Name` object paths.
const FIND_OBJECT_BY_PATH: &str = "find_object_by_path";

/// Text returned to the caller plus an error flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }

    fn from_flag(success: bool, ok: String, failed: impl FnOnce() -> String) -> Self {
        if success {
            Self::ok(ok)
        } else {
            Self::error(failed())
        }
    }
}

/// Successful invocation whose script also reported success.
pub fn script_succeeded(result: &InvocationResult) -> bool {
    result.success && result.output.contains(SCRIPT_SUCCESS_MARKER)
}

/// Absolute project path: relative input is joined onto `workspace`, then
/// `.` and `..` segments are folded.
pub fn resolve_project_path(workspace: &Path, input: &str) -> PathBuf {
    let path = Path::new(input.trim());
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Object path in `Application/Folder/Name` form: backslashes become `/`,
/// leading and trailing slashes are dropped.
pub fn sanitize_object_path(input: &str) -> String {
    input.replace('\\', "/").trim_matches('/').to_string()
}

/// The project tools bound to one CODESYS installation.
#[derive(Debug)]
pub struct ProjectTools<R = SystemProcessRunner> {
    invoker: ScriptInvoker<R>,
    templates: TemplateStore,
    codesys_path: PathBuf,
    profile: String,
    workspace: PathBuf,
    program_data: PathBuf,
}

impl ProjectTools<SystemProcessRunner> {
    /// Tools spawning real CODESYS processes as configured.
    pub fn from_config(config: &BridgeConfig) -> Self {
        let invoker = ScriptInvoker::new()
            .with_strategy(config.launch_strategy)
            .with_timeout(config.timeout);
        Self::with_invoker(invoker, config)
    }
}

impl<R: ProcessRunner> ProjectTools<R> {
    pub fn with_invoker(invoker: ScriptInvoker<R>, config: &BridgeConfig) -> Self {
        Self {
            invoker,
            templates: TemplateStore::new(&config.scripts_dir),
            codesys_path: config.codesys_path.clone(),
            profile: config.profile_name.clone(),
            workspace: config.workspace_dir.clone(),
            program_data: locate::program_data_dir(|key| std::env::var(key).ok()),
        }
    }

    /// Override where `create_project` looks for shared templates.
    pub fn with_program_data(mut self, dir: impl Into<PathBuf>) -> Self {
        self.program_data = dir.into();
        self
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    pub fn invoker(&self) -> &ScriptInvoker<R> {
        &self.invoker
    }

    /// Run one tool call.
    ///
    /// `Err` is reserved for failures outside the tool's own domain: invalid
    /// invocation preconditions and unusable script templates.
    pub async fn call(&self, request: ToolRequest) -> Result<ToolOutput, CoreError> {
        let tool = request.name();
        tracing::info!(tool, "Tool call");
        let output = match request {
            ToolRequest::CheckStatus(_) => self.check_status().await,
            ToolRequest::OpenProject(a) => self.open_project(&a.file_path).await,
            ToolRequest::CreateProject(a) => self.create_project(&a.file_path).await,
            ToolRequest::SaveProject(a) => self.save_project(&a.project_file_path).await,
            ToolRequest::CreatePou(a) => self.create_pou(&a).await,
            ToolRequest::SetPouCode(a) => self.set_pou_code(&a).await,
            ToolRequest::CreateProperty(a) => self.create_property(&a).await,
            ToolRequest::CreateMethod(a) => self.create_method(&a).await,
            ToolRequest::CompileProject(a) => self.compile_project(&a.project_file_path).await,
            ToolRequest::GetProjectStructure(a) => self.get_project_structure(&a.project_path).await,
            ToolRequest::GetPouCode(a) => self.get_pou_code(&a).await,
        }?;
        tracing::info!(tool, is_error = output.is_error, "Tool finished");
        Ok(output)
    }

    /// Compose `names`, interpolate `params` and invoke the script.
    async fn run(
        &self,
        names: &[&str],
        params: &[(&str, &str)],
    ) -> Result<InvocationResult, CoreError> {
        let composed = self.templates.compose(names).await?;
        // Checked before interpolation; user code may contain `{END_IF}`-style pragmas.
        let unresolved: Vec<String> = templates::unresolved_placeholders(&composed)
            .into_iter()
            .filter(|name| !params.iter().any(|(key, _)| key == name))
            .collect();
        if !unresolved.is_empty() {
            return Err(CoreError::Template {
                name: names.last().copied().unwrap_or_default().to_string(),
                message: format!("unresolved placeholders: {}", unresolved.join(", ")),
            });
        }
        let script = templates::interpolate(&composed, params);
        self.invoker
            .invoke(&script, &self.codesys_path, &self.profile)
            .await
    }

    fn project(&self, input: &str) -> Result<PathBuf, ToolOutput> {
        if input.trim().is_empty() {
            return Err(ToolOutput::error("Error: Project file path cannot be empty."));
        }
        Ok(resolve_project_path(&self.workspace, input))
    }

    pub async fn check_status(&self) -> Result<ToolOutput, CoreError> {
        let result = self.run(&["check_status"], &[]).await?;
        let fields = parse::status_fields(&result.output);
        let text = parse::render_status(&fields);
        let failed = !result.success || !parse::scripting_ok(&fields);
        Ok(ToolOutput { text, is_error: failed })
    }

    pub async fn open_project(&self, file_path: &str) -> Result<ToolOutput, CoreError> {
        let path = match self.project(file_path) {
            Ok(p) => p,
            Err(out) => return Ok(out),
        };
        let shown = path.display().to_string();
        let result = self
            .run(&[ENSURE_PROJECT_OPEN, "open_project"], &[("PROJECT_FILE_PATH", &shown)])
            .await?;
        Ok(ToolOutput::from_flag(
            script_succeeded(&result),
            format!("Project opened: {shown}"),
            || format!("Failed open project {shown}. Output:\n{}", result.output),
        ))
    }

    pub async fn create_project(&self, file_path: &str) -> Result<ToolOutput, CoreError> {
        let path = match self.project(file_path) {
            Ok(p) => p,
            Err(out) => return Ok(out),
        };
        let shown = path.display().to_string();

        let Some(template) =
            locate::find_standard_template(&self.codesys_path, &self.profile, &self.program_data)
                .await
        else {
            tracing::warn!(exe = %self.codesys_path.display(), "Standard project template not found");
            return Ok(ToolOutput::error(
                "Template Error: Standard template project file not found at relative path or ProgramData locations.",
            ));
        };
        let template = template.display().to_string();

        let result = self
            .run(
                &["create_project"],
                &[
                    ("PROJECT_FILE_PATH", &shown),
                    ("TEMPLATE_PROJECT_PATH", &template),
                ],
            )
            .await?;
        Ok(ToolOutput::from_flag(
            script_succeeded(&result),
            format!("Project created from template: {shown}"),
            || format!("Failed create project {shown} from template. Output:\n{}", result.output),
        ))
    }

    pub async fn save_project(&self, file_path: &str) -> Result<ToolOutput, CoreError> {
        let path = match self.project(file_path) {
            Ok(p) => p,
            Err(out) => return Ok(out),
        };
        let shown = path.display().to_string();
        let result = self
            .run(&[ENSURE_PROJECT_OPEN, "save_project"], &[("PROJECT_FILE_PATH", &shown)])
            .await?;
        Ok(ToolOutput::from_flag(
            script_succeeded(&result),
            format!("Project saved: {shown}"),
            || format!("Failed save project {shown}. Output:\n{}", result.output),
        ))
    }

    pub async fn create_pou(&self, args: &CreatePouArgs) -> Result<ToolOutput, CoreError> {
        let path = match self.project(&args.project_file_path) {
            Ok(p) => p,
            Err(out) => return Ok(out),
        };
        let shown = path.display().to_string();
        let name = args.name.trim();
        let parent = sanitize_object_path(&args.parent_path);
        if name.is_empty() {
            return Ok(ToolOutput::error("Error: POU name cannot be empty."));
        }

        let result = self
            .run(
                &[ENSURE_PROJECT_OPEN, FIND_OBJECT_BY_PATH, "create_pou"],
                &[
                    ("PROJECT_FILE_PATH", &shown),
                    ("POU_NAME", name),
                    ("POU_TYPE_STR", args.pou_type.as_str()),
                    ("IMPL_LANGUAGE_STR", args.language.as_str()),
                    ("PARENT_PATH", &parent),
                ],
            )
            .await?;
        Ok(ToolOutput::from_flag(
            script_succeeded(&result),
            format!("POU '{name}' created in '{parent}' of {shown}. Project saved."),
            || format!("Failed create POU '{name}'. Output:\n{}", result.output),
        ))
    }

    pub async fn set_pou_code(&self, args: &SetPouCodeArgs) -> Result<ToolOutput, CoreError> {
        if args.declaration_code.is_none() && args.implementation_code.is_none() {
            return Ok(ToolOutput::error(
                "Error: At least one of declarationCode or implementationCode must be provided.",
            ));
        }
        let path = match self.project(&args.project_file_path) {
            Ok(p) => p,
            Err(out) => return Ok(out),
        };
        let shown = path.display().to_string();
        let pou = sanitize_object_path(&args.pou_path);
        let flag = |part: &Option<String>| if part.is_some() { "1" } else { "0" };

        let result = self
            .run(
                &[ENSURE_PROJECT_OPEN, FIND_OBJECT_BY_PATH, "set_pou_code"],
                &[
                    ("PROJECT_FILE_PATH", &shown),
                    ("POU_FULL_PATH", &pou),
                    ("SET_DECLARATION", flag(&args.declaration_code)),
                    ("SET_IMPLEMENTATION", flag(&args.implementation_code)),
                    ("DECLARATION_CONTENT", args.declaration_code.as_deref().unwrap_or_default()),
                    (
                        "IMPLEMENTATION_CONTENT",
                        args.implementation_code.as_deref().unwrap_or_default(),
                    ),
                ],
            )
            .await?;
        Ok(ToolOutput::from_flag(
            script_succeeded(&result),
            format!("Code set for '{pou}' in {shown}. Project saved."),
            || format!("Failed set code for '{pou}'. Output:\n{}", result.output),
        ))
    }

    pub async fn create_property(&self, args: &CreatePropertyArgs) -> Result<ToolOutput, CoreError> {
        let name = args.property_name.trim();
        let property_type = args.property_type.trim();
        if name.is_empty() || property_type.is_empty() {
            return Ok(ToolOutput::error("Error: Property name and type cannot be empty."));
        }
        let path = match self.project(&args.project_file_path) {
            Ok(p) => p,
            Err(out) => return Ok(out),
        };
        let shown = path.display().to_string();
        let parent = sanitize_object_path(&args.parent_pou_path);

        let result = self
            .run(
                &[ENSURE_PROJECT_OPEN, FIND_OBJECT_BY_PATH, "create_property"],
                &[
                    ("PROJECT_FILE_PATH", &shown),
                    ("PARENT_POU_FULL_PATH", &parent),
                    ("PROPERTY_NAME", name),
                    ("PROPERTY_TYPE", property_type),
                ],
            )
            .await?;
        Ok(ToolOutput::from_flag(
            script_succeeded(&result),
            format!("Property '{name}' created under '{parent}' in {shown}. Project saved."),
            || format!("Failed to create property '{name}'. Output:\n{}", result.output),
        ))
    }

    pub async fn create_method(&self, args: &CreateMethodArgs) -> Result<ToolOutput, CoreError> {
        let name = args.method_name.trim();
        if name.is_empty() {
            return Ok(ToolOutput::error("Error: Method name cannot be empty."));
        }
        let path = match self.project(&args.project_file_path) {
            Ok(p) => p,
            Err(out) => return Ok(out),
        };
        let shown = path.display().to_string();
        let parent = sanitize_object_path(&args.parent_pou_path);
        let return_type = args.return_type.as_deref().unwrap_or_default().trim();

        let result = self
            .run(
                &[ENSURE_PROJECT_OPEN, FIND_OBJECT_BY_PATH, "create_method"],
                &[
                    ("PROJECT_FILE_PATH", &shown),
                    ("PARENT_POU_FULL_PATH", &parent),
                    ("METHOD_NAME", name),
                    ("RETURN_TYPE", return_type),
                ],
            )
            .await?;
        Ok(ToolOutput::from_flag(
            script_succeeded(&result),
            format!("Method '{name}' created under '{parent}' in {shown}. Project saved."),
            || format!("Failed to create method '{name}'. Output:\n{}", result.output),
        ))
    }

    pub async fn compile_project(&self, file_path: &str) -> Result<ToolOutput, CoreError> {
        let path = match self.project(file_path) {
            Ok(p) => p,
            Err(out) => return Ok(out),
        };
        let shown = path.display().to_string();
        let result = self
            .run(&[ENSURE_PROJECT_OPEN, "compile_project"], &[("PROJECT_FILE_PATH", &shown)])
            .await?;

        if !script_succeeded(&result) {
            return Ok(ToolOutput::error(format!(
                "Failed initiating compilation for {shown}. Output:\n{}",
                result.output
            )));
        }
        let mut text = format!(
            "Compilation initiated for application in {shown}. Check CODESYS messages for results."
        );
        if parse::has_compile_errors(&result.output) {
            tracing::warn!(project = %shown, "Build log reported errors");
            text.push_str(" WARNING: Build command reported errors in the output log.");
            return Ok(ToolOutput::error(text));
        }
        Ok(ToolOutput::ok(text))
    }

    pub async fn get_project_structure(&self, project_path: &str) -> Result<ToolOutput, CoreError> {
        let path = match self.project(project_path) {
            Ok(p) => p,
            Err(out) => return Ok(out),
        };
        let shown = path.display().to_string();
        let result = self
            .run(
                &[ENSURE_PROJECT_OPEN, "get_project_structure"],
                &[("PROJECT_FILE_PATH", &shown)],
            )
            .await?;

        if !script_succeeded(&result) {
            return Ok(ToolOutput::error(format!(
                "Error retrieving structure for {shown}.\n\n{}",
                result.output
            )));
        }
        Ok(match parse::project_structure(&result.output) {
            Some(structure) => ToolOutput::ok(structure),
            None => {
                tracing::error!(project = %shown, "Structure markers missing from output");
                ToolOutput::error(format!(
                    "Could not parse structure markers in output for {shown}.\n\nOutput:\n{}",
                    result.output
                ))
            }
        })
    }

    pub async fn get_pou_code(&self, args: &PouCodeArgs) -> Result<ToolOutput, CoreError> {
        let path = match self.project(&args.project_path) {
            Ok(p) => p,
            Err(out) => return Ok(out),
        };
        let shown = path.display().to_string();
        let pou = sanitize_object_path(&args.pou_path);
        if pou.is_empty() {
            return Ok(ToolOutput::error("Error: Project or POU path missing."));
        }

        let result = self
            .run(
                &[ENSURE_PROJECT_OPEN, FIND_OBJECT_BY_PATH, "get_pou_code"],
                &[("PROJECT_FILE_PATH", &shown), ("POU_FULL_PATH", &pou)],
            )
            .await?;

        if !script_succeeded(&result) {
            return Ok(ToolOutput::error(format!(
                "Error retrieving code for object '{pou}' in project '{shown}'.\n\n{}",
                result.output
            )));
        }
        let code = parse::PouCode::parse(&result.output);
        if code.declaration.is_none() || code.implementation.is_none() {
            tracing::warn!(pou = %pou, "POU code markers incomplete in output");
        }
        Ok(ToolOutput::ok(code.render()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
