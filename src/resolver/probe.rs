//! Probing the target environment for already-installed imports.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::util::process::{find_python, ProcessBuilder};

/// Imports `argv[1]` and, when given, looks up attribute `argv[2]` on it.
const PROBE_SCRIPT: &str = "import importlib, sys\n\
m = importlib.import_module(sys.argv[1])\n\
if len(sys.argv) > 2:\n    getattr(m, sys.argv[2])\n";

/// Checks whether an import is already satisfied by the environment.
pub trait ImportProbe: fmt::Debug {
    /// True when `base` imports and, if given, `member` exists on it.
    fn probe(&self, base: &str, member: Option<&str>) -> bool;
}

/// Probe backed by a real Python interpreter.
///
/// The interpreter runs in isolated mode so the project tree itself never
/// counts as installed. Results are cached for the lifetime of the probe.
#[derive(Debug)]
pub struct PythonProbe {
    interpreter: Option<PathBuf>,
    cache: RefCell<HashMap<(String, Option<String>), bool>>,
}

impl PythonProbe {
    /// Locate an interpreter on PATH.
    pub fn detect() -> Self {
        let interpreter = find_python();
        if let Some(path) = &interpreter {
            tracing::debug!("probing imports with {}", path.display());
        }
        Self::with_interpreter(interpreter)
    }

    /// Use a specific interpreter (or none).
    pub fn with_interpreter(interpreter: Option<PathBuf>) -> Self {
        PythonProbe {
            interpreter,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Whether an interpreter is available.
    pub fn is_available(&self) -> bool {
        self.interpreter.is_some()
    }

    fn run(&self, base: &str, member: Option<&str>) -> bool {
        let Some(ref python) = self.interpreter else {
            return false;
        };

        let mut process = ProcessBuilder::new(python)
            .args(["-I", "-c", PROBE_SCRIPT, base])
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .cwd(std::env::temp_dir());
        if let Some(member) = member {
            process = process.arg(member);
        }

        match process.status() {
            Ok(status) => status.success(),
            Err(e) => {
                tracing::warn!("{:#}", e);
                false
            }
        }
    }
}

impl ImportProbe for PythonProbe {
    fn probe(&self, base: &str, member: Option<&str>) -> bool {
        let key = (base.to_string(), member.map(str::to_string));
        if let Some(&installed) = self.cache.borrow().get(&key) {
            return installed;
        }

        let installed = self.run(base, member);
        self.cache.borrow_mut().insert(key, installed);
        installed
    }
}
