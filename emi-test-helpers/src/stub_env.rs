// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use crate::{read_lines, write_script};

/// How the registry's `run` script behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunBehavior {
    /// Writes a fixed byte pattern to `--output` and exits 0.
    Succeed,
    /// Prints to stderr and exits 3 without writing anything.
    Fail,
    /// Records that it started, then sleeps long enough to be interrupted.
    Hang,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutatorBehavior {
    /// Creates `mutants/<new-variant>/Placeholder.class`.
    CreateVariant,
    /// Exits 0 without writing the new variant.
    Lazy,
}

pub struct StubEnvBuilder {
    run: RunBehavior,
    mutator: MutatorBehavior,
    heap_differ: bool,
}

impl Default for StubEnvBuilder {
    fn default() -> Self {
        StubEnvBuilder {
            run: RunBehavior::Succeed,
            mutator: MutatorBehavior::CreateVariant,
            heap_differ: false,
        }
    }
}

impl StubEnvBuilder {
    pub fn run(mut self, run: RunBehavior) -> Self {
        self.run = run;
        self
    }

    pub fn mutator(mut self, mutator: MutatorBehavior) -> Self {
        self.mutator = mutator;
        self
    }

    pub fn heap_differ(mut self, enabled: bool) -> Self {
        self.heap_differ = enabled;
        self
    }

    pub fn build(self) -> StubEnv {
        let _ = env_logger::builder().is_test(true).try_init();
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let project_root = temp_dir.path().join("project");
        let registry = temp_dir.path().join("registry");

        for rel in [
            "bazel-bin/libheap-dump.jar",
            "lib/jacocoagent.jar",
            "lib/jacococli.jar",
        ] {
            let path = project_root.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).expect("create jar directory");
            std::fs::write(&path, b"PK").expect("write stub jar");
        }

        std::fs::create_dir_all(&registry).expect("create registry");
        std::fs::write(registry.join("Seed.class"), b"\xca\xfe\xba\xbe").expect("write seed");

        let env = StubEnv {
            temp_dir,
            project_root,
            registry,
        };
        env.write_run_script(self.run);
        env.write_java();
        env.write_mutator(self.mutator);
        if self.heap_differ {
            env.write_heap_differ();
        }
        env.write_toolchain(self.heap_differ);
        env
    }
}

/// A temporary project root with stub jars and tools, plus a registry whose
/// `run` script fakes the JVM.
///
/// Each stub appends to a log under the project root so tests can see what
/// the driver asked for.
pub struct StubEnv {
    temp_dir: tempfile::TempDir,
    project_root: PathBuf,
    registry: PathBuf,
}

/// Bytes written by the stub `run` script for every dump and trace.
pub const STUB_ARTIFACT: &str = "EMI-STUB";

impl StubEnv {
    pub fn builder() -> StubEnvBuilder {
        StubEnvBuilder::default()
    }

    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn registry(&self) -> &Path {
        &self.registry
    }

    pub fn toolchain_path(&self) -> PathBuf {
        self.project_root.join("emi-toolchain.toml")
    }

    pub fn dumps_dir(&self) -> PathBuf {
        self.registry.join("dumps")
    }

    pub fn coverage_dir(&self) -> PathBuf {
        self.registry.join("coverage")
    }

    pub fn mutants_dir(&self) -> PathBuf {
        self.registry.join("mutants")
    }

    /// Sorted names of the mutant directories written so far.
    pub fn mutants(&self) -> Vec<String> {
        let mut names: Vec<String> = match std::fs::read_dir(self.mutants_dir()) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }

    /// `<variant-path> <profile 0|1>` per `run` invocation.
    pub fn run_log(&self) -> Vec<String> {
        read_lines(&self.project_root.join("run.log"))
    }

    /// `<variant> <new-variant>` per mutator invocation.
    pub fn mutator_log(&self) -> Vec<String> {
        read_lines(&self.project_root.join("mutator.log"))
    }

    /// Full argument list per heap differ invocation.
    pub fn heap_differ_log(&self) -> Vec<String> {
        read_lines(&self.project_root.join("heapdiff.log"))
    }

    fn log_path(&self, name: &str) -> String {
        self.project_root.join(name).display().to_string()
    }

    fn write_run_script(&self, behavior: RunBehavior) {
        let body = match behavior {
            RunBehavior::Succeed => format!(
                r#"variant="$1"; shift
[ -d "$variant" ] || {{ echo "no such variant: $variant" >&2; exit 2; }}
output=""
profile=0
while [ $# -gt 0 ]; do
  case "$1" in
    --output) output="$2"; shift 2 ;;
    --dump-lib|--jacoco) [ -f "$2" ] || exit 2; shift 2 ;;
    --profile) profile=1; shift ;;
    *) echo "unexpected argument: $1" >&2; exit 2 ;;
  esac
done
echo "$variant $profile" >> "{log}"
printf '{artifact}' > "$output"
"#,
                log = self.log_path("run.log"),
                artifact = STUB_ARTIFACT,
            ),
            RunBehavior::Fail => format!(
                r#"echo "$1 failing" >> "{log}"
echo "Exception in thread \"main\" java.lang.VerifyError" >&2
exit 3
"#,
                log = self.log_path("run.log"),
            ),
            RunBehavior::Hang => format!(
                r#"echo "$1 hanging" >> "{log}"
sleep 30
"#,
                log = self.log_path("run.log"),
            ),
        };
        write_script(&self.registry.join("run"), &body);
    }

    /// Stands in for `java -jar jacococli.jar report <trace> ... --xml <out>`.
    fn write_java(&self) {
        let body = r#"trace=""
xml=""
while [ $# -gt 0 ]; do
  case "$1" in
    report) trace="$2"; shift 2 ;;
    --xml) xml="$2"; shift 2 ;;
    *) shift ;;
  esac
done
[ -f "$trace" ] || { echo "missing trace: $trace" >&2; exit 3; }
[ -n "$xml" ] || exit 2
echo '<report name="stub"/>' > "$xml"
"#;
        write_script(&self.project_root.join("bin/java"), body);
    }

    fn write_mutator(&self, behavior: MutatorBehavior) {
        let create = match behavior {
            MutatorBehavior::CreateVariant => {
                r#"mkdir "$registry/mutants/$next" || exit 4
printf 'mutant' > "$registry/mutants/$next/Placeholder.class"
"#
            }
            MutatorBehavior::Lazy => "",
        };
        let body = format!(
            r#"while [ $# -gt 0 ]; do
  case "$1" in
    --registry) registry="$2"; shift 2 ;;
    --variant) variant="$2"; shift 2 ;;
    --new-variant) next="$2"; shift 2 ;;
    --coverage) coverage="$2"; shift 2 ;;
    *) echo "unexpected argument: $1" >&2; exit 2 ;;
  esac
done
[ -f "$coverage" ] || {{ echo "missing coverage: $coverage" >&2; exit 3; }}
{create}echo "$variant $next" >> "{log}"
"#,
            create = create,
            log = self.log_path("mutator.log"),
        );
        write_script(&self.project_root.join("bin/mutator"), &body);
    }

    fn write_heap_differ(&self) {
        let body = format!(
            "echo \"$@\" >> \"{log}\"\n",
            log = self.log_path("heapdiff.log")
        );
        write_script(&self.project_root.join("bin/heapdiff"), &body);
    }

    fn write_toolchain(&self, heap_differ: bool) {
        let mut text = String::from("[toolchain]\njava = \"bin/java\"\nmutator_command = [\"bin/mutator\"]\n");
        if heap_differ {
            text.push_str("heap_differ_command = [\"bin/heapdiff\"]\nheap_differ_prefix = \"com.example\"\n");
        }
        std::fs::write(self.toolchain_path(), text).expect("write toolchain file");
    }
}
