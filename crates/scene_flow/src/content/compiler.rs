use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use roxmltree::{Document, Node};
use tracing::info;

use crate::AppPaths;

use super::table::SceneTable;
use super::types::{DialogLine, DialogScript, SceneDescriptor, SceneKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownElement,
    UnknownField,
    MissingField,
    InvalidValue,
    DuplicateSceneFlow,
    MissingSceneFlow,
    DuplicateDialogs,
    UnknownScene,
    InvalidTable,
}

#[derive(Debug, Clone)]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code,
                self.message,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (file={})",
                self.code,
                self.message,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for ContentCompileError {}

/// Compiled scene flow table plus the dialog scripts of presentation scenes.
#[derive(Debug, Clone)]
pub struct SceneContent {
    pub table: SceneTable,
    dialogs: BTreeMap<String, DialogScript>,
}

impl SceneContent {
    pub fn new(table: SceneTable) -> Self {
        Self {
            table,
            dialogs: BTreeMap::new(),
        }
    }

    pub fn dialog(&self, scene_key: &str) -> Option<&DialogScript> {
        self.dialogs.get(scene_key)
    }

    pub fn dialog_count(&self) -> usize {
        self.dialogs.len()
    }
}

#[derive(Default)]
struct PendingContent {
    scene_flow: Option<(Vec<SceneDescriptor>, PathBuf)>,
    dialogs: Vec<(DialogScript, PathBuf, Option<SourceLocation>)>,
}

pub fn compile_scene_content(app_paths: &AppPaths) -> Result<SceneContent, ContentCompileError> {
    let xml_files = collect_xml_files_sorted(&app_paths.content_dir)
        .map_err(|(path, source)| read_error(path, source))?;

    let mut pending = PendingContent::default();
    for xml_file in &xml_files {
        let raw = fs::read_to_string(xml_file)
            .map_err(|source| read_error(xml_file.clone(), source))?;
        parse_content_document(xml_file, &raw, &mut pending)?;
    }

    let content = finish(pending, &app_paths.content_dir)?;
    info!(
        content_dir = %app_paths.content_dir.display(),
        xml_file_count = xml_files.len(),
        scene_count = content.table.len(),
        dialog_count = content.dialog_count(),
        fingerprint = %content.table.fingerprint(),
        "scene_content_compiled"
    );
    Ok(content)
}

/// Compiles a single in-memory `<Content>` document.
pub fn parse_scene_content_str(
    file_path: &Path,
    raw: &str,
) -> Result<SceneContent, ContentCompileError> {
    let mut pending = PendingContent::default();
    parse_content_document(file_path, raw, &mut pending)?;
    finish(pending, file_path)
}

fn finish(pending: PendingContent, origin: &Path) -> Result<SceneContent, ContentCompileError> {
    let (descriptors, flow_path) = pending.scene_flow.ok_or_else(|| ContentCompileError {
        code: ContentErrorCode::MissingSceneFlow,
        message: "no <SceneFlow> element found in content".to_string(),
        file_path: origin.to_path_buf(),
        location: None,
    })?;

    let table = SceneTable::new(descriptors).map_err(|error| ContentCompileError {
        code: ContentErrorCode::InvalidTable,
        message: error.to_string(),
        file_path: flow_path,
        location: None,
    })?;

    let mut content = SceneContent::new(table);
    for (script, path, location) in pending.dialogs {
        if content.table.index_of(&script.scene_key).is_none() {
            return Err(ContentCompileError {
                code: ContentErrorCode::UnknownScene,
                message: format!(
                    "<Dialogs> references scene '{}' which is not in the scene flow",
                    script.scene_key
                ),
                file_path: path,
                location,
            });
        }
        if content.dialogs.contains_key(&script.scene_key) {
            return Err(ContentCompileError {
                code: ContentErrorCode::DuplicateDialogs,
                message: format!("duplicate <Dialogs> for scene '{}'", script.scene_key),
                file_path: path,
                location,
            });
        }
        content.dialogs.insert(script.scene_key.clone(), script);
    }
    Ok(content)
}

fn parse_content_document(
    file_path: &Path,
    raw: &str,
    pending: &mut PendingContent,
) -> Result<(), ContentCompileError> {
    let doc = Document::parse(raw).map_err(|error| ContentCompileError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != "Content" {
        return Err(error_at_node(
            ContentErrorCode::InvalidRoot,
            "root element must be <Content>".to_string(),
            file_path,
            &doc,
            root,
        ));
    }

    for child in root.children().filter(|node| node.is_element()) {
        match child.tag_name().name() {
            "SceneFlow" => {
                if let Some((_, first_path)) = &pending.scene_flow {
                    return Err(error_at_node(
                        ContentErrorCode::DuplicateSceneFlow,
                        format!(
                            "<SceneFlow> already defined in {}; content may define it only once",
                            first_path.display()
                        ),
                        file_path,
                        &doc,
                        child,
                    ));
                }
                let descriptors = parse_scene_flow(file_path, &doc, child)?;
                pending.scene_flow = Some((descriptors, file_path.to_path_buf()));
            }
            "Dialogs" => {
                let script = parse_dialogs(file_path, &doc, child)?;
                pending.dialogs.push((
                    script,
                    file_path.to_path_buf(),
                    Some(node_location(&doc, child)),
                ));
            }
            other => {
                return Err(error_at_node(
                    ContentErrorCode::UnknownElement,
                    format!("unsupported element <{other}>; expected <SceneFlow> or <Dialogs>"),
                    file_path,
                    &doc,
                    child,
                ))
            }
        }
    }
    Ok(())
}

fn parse_scene_flow(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<Vec<SceneDescriptor>, ContentCompileError> {
    let mut descriptors = Vec::new();
    for scene in node.children().filter(|child| child.is_element()) {
        if scene.tag_name().name() != "Scene" {
            return Err(error_at_node(
                ContentErrorCode::UnknownElement,
                format!(
                    "unsupported element <{}> in <SceneFlow>; expected <Scene>",
                    scene.tag_name().name()
                ),
                file_path,
                doc,
                scene,
            ));
        }
        reject_unknown_attributes(
            file_path,
            doc,
            scene,
            &["key", "type", "next", "onComplete", "onFail"],
        )?;

        let key = required_attribute(file_path, doc, scene, "key")?;
        let raw_kind = required_attribute(file_path, doc, scene, "type")?;
        let kind = SceneKind::parse(raw_kind).ok_or_else(|| {
            error_at_node(
                ContentErrorCode::InvalidValue,
                format!("invalid scene type '{raw_kind}'; expected presentation or challenge"),
                file_path,
                doc,
                scene,
            )
        })?;

        descriptors.push(SceneDescriptor {
            key: key.to_string(),
            kind,
            next_scene: optional_attribute(scene, "next"),
            on_complete: optional_attribute(scene, "onComplete"),
            on_fail: optional_attribute(scene, "onFail"),
        });
    }
    Ok(descriptors)
}

fn parse_dialogs(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<DialogScript, ContentCompileError> {
    reject_unknown_attributes(
        file_path,
        doc,
        node,
        &["scene", "autoAdvance", "advanceDelayMs"],
    )?;
    let scene_key = required_attribute(file_path, doc, node, "scene")?;
    let mut script = DialogScript::new(scene_key);

    if let Some(raw) = node.attribute("autoAdvance") {
        script.auto_advance = match raw {
            "true" => true,
            "false" => false,
            _ => {
                return Err(error_at_node(
                    ContentErrorCode::InvalidValue,
                    format!("invalid autoAdvance '{raw}'; expected true or false"),
                    file_path,
                    doc,
                    node,
                ))
            }
        };
    }
    if let Some(delay) = millis_attribute(file_path, doc, node, "advanceDelayMs")? {
        script.advance_delay = delay;
    }

    for line in node.children().filter(|child| child.is_element()) {
        if line.tag_name().name() != "Line" {
            return Err(error_at_node(
                ContentErrorCode::UnknownElement,
                format!(
                    "unsupported element <{}> in <Dialogs>; expected <Line>",
                    line.tag_name().name()
                ),
                file_path,
                doc,
                line,
            ));
        }
        reject_unknown_attributes(file_path, doc, line, &["speaker", "durationMs"])?;
        let text = line.text().map(str::trim).unwrap_or_default();
        if text.is_empty() {
            return Err(error_at_node(
                ContentErrorCode::MissingField,
                "<Line> must contain text".to_string(),
                file_path,
                doc,
                line,
            ));
        }
        script.lines.push(DialogLine {
            text: text.to_string(),
            speaker: optional_attribute(line, "speaker"),
            duration: millis_attribute(file_path, doc, line, "durationMs")?,
        });
    }
    Ok(script)
}

fn reject_unknown_attributes(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    allowed: &[&str],
) -> Result<(), ContentCompileError> {
    for attribute in node.attributes() {
        if !allowed.contains(&attribute.name()) {
            return Err(error_at_node(
                ContentErrorCode::UnknownField,
                format!(
                    "unknown attribute '{}' on <{}>",
                    attribute.name(),
                    node.tag_name().name()
                ),
                file_path,
                doc,
                node,
            ));
        }
    }
    Ok(())
}

fn required_attribute<'a>(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'a, '_>,
    name: &str,
) -> Result<&'a str, ContentCompileError> {
    match node.attribute(name).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(error_at_node(
            ContentErrorCode::MissingField,
            format!(
                "missing required attribute '{name}' on <{}>",
                node.tag_name().name()
            ),
            file_path,
            doc,
            node,
        )),
    }
}

fn optional_attribute(node: Node<'_, '_>, name: &str) -> Option<String> {
    node.attribute(name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

fn millis_attribute(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    name: &str,
) -> Result<Option<Duration>, ContentCompileError> {
    let Some(raw) = node.attribute(name) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(|millis| Some(Duration::from_millis(millis)))
        .map_err(|_| {
            error_at_node(
                ContentErrorCode::InvalidValue,
                format!("invalid {name} '{raw}'; expected milliseconds as an unsigned integer"),
                file_path,
                doc,
                node,
            )
        })
}

fn node_location(doc: &Document<'_>, node: Node<'_, '_>) -> SourceLocation {
    let pos = doc.text_pos_at(node.range().start);
    SourceLocation {
        line: pos.row as usize,
        column: pos.col as usize,
    }
}

fn error_at_node(
    code: ContentErrorCode,
    message: String,
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> ContentCompileError {
    ContentCompileError {
        code,
        message,
        file_path: file_path.to_path_buf(),
        location: Some(node_location(doc, node)),
    }
}

fn read_error(path: PathBuf, source: io::Error) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read content: {source}"),
        file_path: path,
        location: None,
    }
}

fn collect_xml_files_sorted(dir: &Path) -> Result<Vec<PathBuf>, (PathBuf, io::Error)> {
    let mut files = Vec::new();
    collect_recursive(dir, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_recursive(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), (PathBuf, io::Error)> {
    let entries = fs::read_dir(dir).map_err(|error| (dir.to_path_buf(), error))?;
    for entry in entries {
        let entry = entry.map_err(|error| (dir.to_path_buf(), error))?;
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(&path, files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        {
            files.push(path);
        }
    }
    Ok(())
}
