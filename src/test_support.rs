//! Step recording for tests.
//!
//! `test_report!` creates a [`TestReport`] named after the calling test. Each
//! assertion is recorded before it is checked; when `TEST_REPORT_DIR` is set
//! the steps are written to `<dir>/<test path>.txt` as the report is dropped.
//! Unit tests get this module through `#[cfg(test)]`, integration tests
//! include the file with `#[path]`.

use std::fmt::{Debug, Display};
use std::path::PathBuf;
use std::sync::Mutex;

/// Auto-detect the test name from the calling function.
/// Works for both sync and async test functions.
#[macro_export]
macro_rules! test_report {
    ($title:expr) => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            std::any::type_name::<T>()
        }
        let name = type_name_of(f);
        let name = name.strip_suffix("::f").unwrap_or(name);
        let name = name.strip_suffix("::{{closure}}").unwrap_or(name);
        $crate::test_support::TestReport::new(name, $title, file!(), line!())
    }};
}

enum Step {
    Setup(String),
    Action(String),
    Pass(String),
    Fail(String),
}

impl Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Setup(msg) => write!(f, "STEP setup: {}", msg),
            Step::Action(msg) => write!(f, "STEP action: {}", msg),
            Step::Pass(msg) => write!(f, "STEP assert_pass: {}", msg),
            Step::Fail(msg) => write!(f, "STEP assert_fail: {}", msg),
        }
    }
}

pub struct TestReport {
    full_path: String,
    title: String,
    source: String,
    steps: Mutex<Vec<Step>>,
    report_dir: Option<PathBuf>,
}

#[allow(dead_code)]
impl TestReport {
    pub fn new(full_path: &str, title: &str, source_file: &str, source_line: u32) -> Self {
        Self {
            full_path: full_path.to_string(),
            title: title.to_string(),
            source: format!("{}:{}", source_file, source_line),
            steps: Mutex::new(Vec::new()),
            report_dir: std::env::var_os("TEST_REPORT_DIR").map(PathBuf::from),
        }
    }

    fn record(&self, step: Step) {
        if let Ok(mut steps) = self.steps.lock() {
            steps.push(step);
        }
    }

    fn show(value: &impl Debug) -> String {
        let text = format!("{:?}", value);
        if text.len() <= 400 {
            format!("`{}`", text)
        } else {
            let cut = (0..=400).rev().find(|i| text.is_char_boundary(*i)).unwrap_or(0);
            format!("`{}…` ({} bytes)", &text[..cut], text.len())
        }
    }

    pub fn setup(&self, msg: impl Display) {
        self.record(Step::Setup(msg.to_string()));
    }

    pub fn action(&self, msg: impl Display) {
        self.record(Step::Action(msg.to_string()));
    }

    pub fn assert_eq<A, E>(&self, label: &str, actual: &A, expected: &E)
    where
        A: PartialEq<E> + Debug,
        E: Debug,
    {
        let msg = format!("{}: {} == {}", label, Self::show(actual), Self::show(expected));
        if actual == expected {
            self.record(Step::Pass(msg));
        } else {
            self.record(Step::Fail(msg));
        }
        assert_eq!(actual, expected, "{}", label);
    }

    pub fn assert_contains(&self, label: &str, haystack: &str, needle: &str) {
        let pass = haystack.contains(needle);
        let msg = format!(
            "{}: {} contains {}",
            label,
            Self::show(&haystack),
            Self::show(&needle)
        );
        self.record(if pass { Step::Pass(msg) } else { Step::Fail(msg) });
        assert!(pass, "{}: {:?} does not contain {:?}", label, haystack, needle);
    }

    pub fn assert_true(&self, label: &str, value: bool) {
        let msg = format!("{}: `{}`", label, value);
        self.record(if value { Step::Pass(msg) } else { Step::Fail(msg) });
        assert!(value, "{}", label);
    }

    fn write_report(&self) {
        let Some(dir) = &self.report_dir else {
            return;
        };

        let result = if std::thread::panicking() { "fail" } else { "pass" };
        let mut segments = self.full_path.rsplit("::");
        let name = segments.next().unwrap_or(&self.full_path);
        let group = segments.next().unwrap_or(name);

        let mut lines = vec![
            format!("GROUP: {}", group),
            format!("NAME: {}", name),
            format!("TITLE: {}", self.title),
            format!("SOURCE: {}", self.source),
        ];
        if let Ok(steps) = self.steps.lock() {
            lines.extend(steps.iter().map(|step| step.to_string()));
        }
        lines.push(format!("RESULT: {}", result));
        lines.push(String::new());

        let path = dir.join(format!("{}.txt", self.full_path.replace("::", "__")));
        let _ = std::fs::create_dir_all(dir);
        let _ = std::fs::write(path, lines.join("\n"));
    }
}

impl Drop for TestReport {
    fn drop(&mut self) {
        self.write_report();
    }
}
