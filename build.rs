use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Only the crate's own sources are policed.
const SOURCE_DIRS: [&str; 3] = ["income", "cli", "tests"];

// What a collector is looking for decides which matched lines count as violations.
#[derive(Clone, Copy)]
enum Rule {
    UnderscorePrefix,
    AllowDeadCode,
    AllCapsComment,
}

impl Rule {
    fn pattern(self) -> &'static str {
        match self {
            Rule::UnderscorePrefix => r"\b(_[a-zA-Z0-9_]+)\b",
            Rule::AllowDeadCode => r"#\[allow\(dead_code\)\]",
            Rule::AllCapsComment => r"//.*",
        }
    }

    fn explanation(self) -> &'static str {
        match self {
            Rule::UnderscorePrefix => {
                "Underscore-prefixed variable names are not allowed in this project.\n   Either use the variable (removing the underscore) or remove it completely."
            }
            Rule::AllowDeadCode => {
                "#[allow(dead_code)] attributes are not allowed in this project.\n   Either use the code (removing the attribute) or remove it completely."
            }
            Rule::AllCapsComment => {
                "Comments where all alphabetic characters are uppercase are not allowed in this project."
            }
        }
    }
}

// A custom "Sink" for the grep searcher. It collects the violating lines
// from a single file to build a comprehensive error message.
struct ViolationCollector {
    rule: Rule,
    violations: Vec<String>,
    file_path: PathBuf,
}

impl ViolationCollector {
    fn new(rule: Rule, file_path: &Path) -> Self {
        Self {
            rule,
            violations: Vec::new(),
            file_path: file_path.to_path_buf(),
        }
    }

    fn check_and_get_error_message(&self) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }

        let file_name = self.file_path.to_str().unwrap_or("?");
        let mut error_msg = format!(
            "\n❌ ERROR: Found {} violations in {}:\n",
            self.violations.len(),
            file_name
        );
        for violation in &self.violations {
            error_msg.push_str(&format!("   {violation}\n"));
        }
        error_msg.push_str(&format!("\n⚠️ {}\n", self.rule.explanation()));
        Some(error_msg)
    }
}

fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with("//")
}

// True when every match of `_ident` on the line sits inside a string literal.
fn only_in_strings(line: &str) -> bool {
    line.split('"')
        .enumerate()
        .filter(|(i, part)| i % 2 == 0 && part.contains('_'))
        .all(|(_, part)| {
            !part
                .split(|c: char| !(c.is_alphanumeric() || c == '_'))
                .any(|word| word.len() > 1 && word.starts_with('_'))
        })
}

fn comment_is_all_caps(line: &str) -> bool {
    let Some(idx) = line.find("//") else {
        return false;
    };
    let comment = line[idx..].trim_start_matches(['/', '!']);
    let alpha: Vec<char> = comment.chars().filter(|c| c.is_alphabetic()).collect();
    !alpha.is_empty() && alpha.iter().all(|c| c.is_uppercase())
}

impl Sink for ViolationCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();

        let violating = match self.rule {
            Rule::UnderscorePrefix => !is_comment(line_text) && !only_in_strings(line_text),
            Rule::AllowDeadCode => true,
            Rule::AllCapsComment => is_comment(line_text) && comment_is_all_caps(line_text),
        };
        if violating {
            self.violations.push(format!("{line_number}:{line_text}"));
        }

        // Keep searching the same file.
        Ok(true)
    }
}

fn rust_sources() -> impl Iterator<Item = PathBuf> {
    SOURCE_DIRS.into_iter().flat_map(|dir| {
        WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
            .map(|e| e.into_path())
    })
}

fn scan(rule: Rule) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(rule.pattern())?;
    let mut searcher = Searcher::new();

    for path in rust_sources() {
        let mut collector = ViolationCollector::new(rule, &path);
        searcher.search_path(&matcher, &path, &mut collector)?;
        if let Some(error_message) = collector.check_and_get_error_message() {
            return Err(error_message.into());
        }
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for dir in SOURCE_DIRS {
        println!("cargo:rerun-if-changed={dir}");
    }

    for rule in [
        Rule::UnderscorePrefix,
        Rule::AllowDeadCode,
        Rule::AllCapsComment,
    ] {
        if let Err(e) = scan(rule) {
            // The `eprintln!` here is what shows the error in `cargo`'s output.
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
