use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::constants::{BINARY_NAME, DEFAULT_JAVA_CLASS, DEFAULT_SOURCE_STEM};
use crate::core::domain::{Invocation, Language};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolchainError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
}

impl FromStr for Language {
    type Err = ToolchainError;

    /// Accepts canonical names, editor mode names and the numeric ids the
    /// contest frontend sends.
    fn from_str(id: &str) -> Result<Self, Self::Err> {
        match id.trim().to_ascii_lowercase().as_str() {
            "cpp" | "c++" | "c_cpp" | "54" => Ok(Language::Cpp),
            "python" | "py" | "62" => Ok(Language::Python),
            "java" | "71" => Ok(Language::Java),
            _ => Err(ToolchainError::UnsupportedLanguage(id.to_string())),
        }
    }
}

/// Executables used to build the toolchain table. Read once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolchainPaths {
    pub gxx: String,
    pub python: String,
    pub javac: String,
    pub java: String,
}

impl Default for ToolchainPaths {
    fn default() -> Self {
        Self {
            gxx: "g++".to_string(),
            python: "python3".to_string(),
            javac: "javac".to_string(),
            java: "java".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum EntryPoint {
    Fixed,
    JavaPublicClass,
}

/// Compile and run argv templates for one language.
///
/// Templates may contain `{source}`, `{binary}`, `{workdir}` and `{entry}`;
/// they are substituted per argument, never through a shell.
#[derive(Debug, Clone)]
pub struct ToolchainSpec {
    pub language: Language,
    pub source_extension: &'static str,
    pub compile_args: Option<Vec<String>>,
    pub run_args: Vec<String>,
    entry: EntryPoint,
}

/// Where a submission landed inside its workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedSource {
    pub workdir: PathBuf,
    pub source_path: PathBuf,
    pub entry: String,
}

impl ToolchainSpec {
    /// Stem of the source file. Java needs it to match the public class.
    pub fn entry_name(&self, code: &str) -> String {
        match self.entry {
            EntryPoint::Fixed => DEFAULT_SOURCE_STEM.to_string(),
            EntryPoint::JavaPublicClass => detect_java_class(code),
        }
    }

    pub fn source_file_name(&self, code: &str) -> String {
        format!("{}.{}", self.entry_name(code), self.source_extension)
    }

    pub fn compile_invocation(
        &self,
        source: &PreparedSource,
        timeout: Duration,
    ) -> Option<Invocation> {
        self.compile_args
            .as_ref()
            .map(|argv| render(argv, source, None, timeout))
    }

    pub fn run_invocation(
        &self,
        source: &PreparedSource,
        stdin: &str,
        timeout: Duration,
    ) -> Invocation {
        render(&self.run_args, source, Some(stdin.to_string()), timeout)
    }
}

fn render(
    argv: &[String],
    source: &PreparedSource,
    stdin: Option<String>,
    timeout: Duration,
) -> Invocation {
    let binary = source.workdir.join(BINARY_NAME);
    let substitute = |arg: &String| {
        arg.replace("{source}", &path_str(&source.source_path))
            .replace("{binary}", &path_str(&binary))
            .replace("{workdir}", &path_str(&source.workdir))
            .replace("{entry}", &source.entry)
    };

    let mut rendered = argv.iter().map(substitute);
    Invocation {
        program: rendered.next().unwrap_or_default(),
        args: rendered.collect(),
        cwd: source.workdir.clone(),
        stdin,
        timeout,
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn detect_java_class(code: &str) -> String {
    code.lines()
        .find_map(public_class_name)
        .unwrap_or_else(|| DEFAULT_JAVA_CLASS.to_string())
}

/// `Name` from a `public ... class Name<T> extends ... {` declaration.
fn public_class_name(line: &str) -> Option<String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    words.iter().enumerate().find_map(|(idx, word)| {
        if *word != "class" || !words[..idx].contains(&"public") {
            return None;
        }
        let name = words.get(idx + 1)?.split(['{', '<']).next().unwrap_or_default();
        is_java_identifier(name).then(|| name.to_string())
    })
}

fn is_java_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Fixed language → toolchain table.
#[derive(Debug, Clone)]
pub struct ToolchainRegistry {
    specs: HashMap<Language, ToolchainSpec>,
}

impl ToolchainRegistry {
    pub fn new(paths: &ToolchainPaths) -> Self {
        let argv = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        let specs = [
            ToolchainSpec {
                language: Language::Cpp,
                source_extension: "cpp",
                compile_args: Some(argv(&[
                    paths.gxx.as_str(), "-std=c++17", "-O2", "-o", "{binary}", "{source}",
                ])),
                run_args: argv(&["{binary}"]),
                entry: EntryPoint::Fixed,
            },
            ToolchainSpec {
                language: Language::Python,
                source_extension: "py",
                compile_args: None,
                run_args: argv(&[paths.python.as_str(), "{source}"]),
                entry: EntryPoint::Fixed,
            },
            ToolchainSpec {
                language: Language::Java,
                source_extension: "java",
                compile_args: Some(argv(&[paths.javac.as_str(), "-d", "{workdir}", "{source}"])),
                run_args: argv(&[paths.java.as_str(), "-cp", "{workdir}", "{entry}"]),
                entry: EntryPoint::JavaPublicClass,
            },
        ]
        .into_iter()
        .map(|spec| (spec.language.clone(), spec))
        .collect();

        Self { specs }
    }

    pub fn lookup(&self, language_id: &str) -> Result<&ToolchainSpec, ToolchainError> {
        let language: Language = language_id.parse()?;
        self.specs
            .get(&language)
            .ok_or_else(|| ToolchainError::UnsupportedLanguage(language_id.to_string()))
    }
}

impl Default for ToolchainRegistry {
    fn default() -> Self {
        Self::new(&ToolchainPaths::default())
    }
}
