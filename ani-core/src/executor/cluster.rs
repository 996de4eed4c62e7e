//! SGE/OGE cluster-queue executor
//!
//! Each dependency level of the graph is cut into array jobs of at most
//! `group_size` tasks. Every array writes its commands to a file, one per line,
//! and a task script picks line `$SGE_TASK_ID`. Arrays of level k+1 are held on
//! all arrays of level k. A final `-sync y` sentinel held on every array makes
//! the call block until the scheduler has drained the whole graph.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{ExecutionReport, ExecutorError, ExecutorResult, GraphExecutor, NodeOutcome, NodeStatus};
use crate::graph::{dependency_levels, JobNode};

#[derive(Debug, Clone)]
pub struct SgeParams {
    pub job_prefix: String,
    /// Maximum tasks per array job
    pub group_size: usize,
    /// Extra arguments appended to every qsub call, e.g. `-q all.q -pe smp 2`
    pub extra_args: Option<String>,
    /// Where array scripts, command lists and scheduler logs are written
    pub script_dir: PathBuf,
    pub qsub: PathBuf,
}

impl Default for SgeParams {
    fn default() -> Self {
        Self {
            job_prefix: "ANI".to_string(),
            group_size: 10_000,
            extra_args: None,
            script_dir: PathBuf::from("jobs"),
            qsub: PathBuf::from("qsub"),
        }
    }
}

/// One submitted array job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobArray {
    pub name: String,
    pub commands: Vec<String>,
    /// Names of arrays that must finish first
    pub holds: Vec<String>,
}

pub struct SgeExecutor {
    params: SgeParams,
}

impl SgeExecutor {
    pub fn new(params: SgeParams) -> Self {
        Self { params }
    }

    /// Group the graph into array jobs, level by level
    pub fn plan_arrays(&self, nodes: Vec<JobNode>) -> ExecutorResult<Vec<JobArray>> {
        let group_size = self.params.group_size.max(1);
        let mut arrays = Vec::new();
        let mut previous: Vec<String> = Vec::new();

        for (level, nodes) in dependency_levels(nodes)?.into_iter().enumerate() {
            let mut current = Vec::new();
            for (batch, chunk) in nodes.chunks(group_size).enumerate() {
                let name = format!("{}_L{}_{:03}", self.params.job_prefix, level, batch);
                current.push(name.clone());
                arrays.push(JobArray {
                    name,
                    commands: chunk.iter().map(|n| n.command.clone()).collect(),
                    holds: previous.clone(),
                });
            }
            previous = current;
        }
        Ok(arrays)
    }

    fn extra_args(&self) -> Vec<String> {
        self.params
            .extra_args
            .as_deref()
            .map(|a| a.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// qsub arguments for one array job
    pub fn submit_args(&self, array: &JobArray, script: &Path) -> Vec<String> {
        let logs = self.params.script_dir.display().to_string();
        let mut args = vec![
            "-N".to_string(),
            array.name.clone(),
            "-t".to_string(),
            format!("1-{}", array.commands.len()),
            "-cwd".to_string(),
            "-o".to_string(),
            logs.clone(),
            "-e".to_string(),
            logs,
        ];
        if !array.holds.is_empty() {
            args.push("-hold_jid".to_string());
            args.push(array.holds.join(","));
        }
        args.extend(self.extra_args());
        args.push(script.display().to_string());
        args
    }

    /// qsub arguments for the blocking sentinel held on every array
    pub fn sentinel_args(&self, arrays: &[JobArray]) -> Vec<String> {
        let names: Vec<&str> = arrays.iter().map(|a| a.name.as_str()).collect();
        let mut args = vec![
            "-sync".to_string(),
            "y".to_string(),
            "-N".to_string(),
            format!("{}_wait", self.params.job_prefix),
            "-hold_jid".to_string(),
            names.join(","),
            "-o".to_string(),
            "/dev/null".to_string(),
            "-e".to_string(),
            "/dev/null".to_string(),
        ];
        args.extend(self.extra_args());
        args.extend(["-b".to_string(), "y".to_string(), "true".to_string()]);
        args
    }

    fn write_array_files(&self, array: &JobArray) -> ExecutorResult<PathBuf> {
        let commands = self.params.script_dir.join(format!("{}.cmds", array.name));
        let script = self.params.script_dir.join(format!("{}.sh", array.name));

        let mut listing = array.commands.join("\n");
        listing.push('\n');
        fs::write(&commands, listing)?;
        fs::write(
            &script,
            format!(
                "#!/bin/sh\n#$ -S /bin/sh\ncmd=$(sed -n \"${{SGE_TASK_ID}}p\" '{}')\neval \"$cmd\"\n",
                commands.display()
            ),
        )?;
        Ok(script)
    }

    fn qsub(&self, args: &[String]) -> ExecutorResult<()> {
        log::debug!("{} {}", self.params.qsub.display(), args.join(" "));
        let output = Command::new(&self.params.qsub).args(args).output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(ExecutorError::Scheduler {
                tool: self.params.qsub.display().to_string(),
                message: format!(
                    "exit code {:?}: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            })
        }
    }
}

impl GraphExecutor for SgeExecutor {
    fn execute(&self, nodes: Vec<JobNode>) -> ExecutorResult<ExecutionReport> {
        let ids: Vec<_> = nodes.iter().map(|n| n.id.clone()).collect();
        let arrays = self.plan_arrays(nodes)?;
        if arrays.is_empty() {
            return Ok(ExecutionReport::default());
        }

        fs::create_dir_all(&self.params.script_dir)?;
        log::info!(
            "Submitting {} jobs as {} array jobs (group size {})",
            ids.len(),
            arrays.len(),
            self.params.group_size
        );

        for array in &arrays {
            let script = self.write_array_files(array)?;
            self.qsub(&self.submit_args(array, &script))?;
            log::info!("Submitted {} ({} tasks)", array.name, array.commands.len());
        }

        log::info!("Waiting for scheduler to complete all jobs");
        self.qsub(&self.sentinel_args(&arrays))?;

        // Per-task exit codes stay with the scheduler
        Ok(ExecutionReport {
            outcomes: ids
                .into_iter()
                .map(|id| NodeOutcome {
                    id,
                    status: NodeStatus::Succeeded,
                    exit_code: None,
                })
                .collect(),
        })
    }

    fn name(&self) -> &'static str {
        "sge"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn graph(pairs: usize) -> Vec<JobNode> {
        let mut nodes = Vec::new();
        for i in 0..pairs {
            let align = JobNode::new(format!("ANI_{:06}-n", i), format!("nucmer {}", i));
            let filter = JobNode::new(format!("ANI_{:06}-f", i), format!("delta-filter {}", i))
                .with_dependency(&align);
            nodes.push(align);
            nodes.push(filter);
        }
        nodes
    }

    fn executor(dir: &Path, group_size: usize) -> SgeExecutor {
        SgeExecutor::new(SgeParams {
            job_prefix: "ANI".to_string(),
            group_size,
            extra_args: Some("-q all.q".to_string()),
            script_dir: dir.to_path_buf(),
            qsub: PathBuf::from("qsub"),
        })
    }

    #[test]
    fn test_plan_groups_levels() {
        let dir = TempDir::new().unwrap();
        let arrays = executor(dir.path(), 2).plan_arrays(graph(3)).unwrap();

        let names: Vec<&str> = arrays.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["ANI_L0_000", "ANI_L0_001", "ANI_L1_000", "ANI_L1_001"]);
        assert_eq!(arrays[0].commands, vec!["nucmer 0", "nucmer 1"]);
        assert_eq!(arrays[1].commands, vec!["nucmer 2"]);
        assert!(arrays[0].holds.is_empty());
        assert_eq!(arrays[2].holds, vec!["ANI_L0_000", "ANI_L0_001"]);
    }

    #[test]
    fn test_submit_args() {
        let dir = TempDir::new().unwrap();
        let exec = executor(dir.path(), 10);
        let arrays = exec.plan_arrays(graph(2)).unwrap();
        let args = exec.submit_args(&arrays[1], Path::new("/jobs/ANI_L1_000.sh"));

        assert_eq!(args[0..4], ["-N", "ANI_L1_000", "-t", "1-2"]);
        let hold = args.iter().position(|a| a == "-hold_jid").unwrap();
        assert_eq!(args[hold + 1], "ANI_L0_000");
        assert_eq!(args[args.len() - 3..], ["-q", "all.q", "/jobs/ANI_L1_000.sh"]);

        let sentinel = exec.sentinel_args(&arrays);
        assert_eq!(sentinel[0..2], ["-sync", "y"]);
        assert!(sentinel.contains(&"ANI_L0_000,ANI_L1_000".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn test_execute_with_stub_qsub() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let calls = dir.path().join("calls.log");
        let qsub = dir.path().join("qsub");
        fs::write(&qsub, format!("#!/bin/sh\necho \"$@\" >> '{}'\n", calls.display())).unwrap();
        fs::set_permissions(&qsub, fs::Permissions::from_mode(0o755)).unwrap();

        let scripts = dir.path().join("jobs");
        let exec = SgeExecutor::new(SgeParams {
            job_prefix: "ANI".to_string(),
            group_size: 10,
            extra_args: None,
            script_dir: scripts.clone(),
            qsub,
        });

        let report = exec.execute(graph(2)).unwrap();
        assert_eq!(report.succeeded(), 4);

        let logged = fs::read_to_string(&calls).unwrap();
        let lines: Vec<&str> = logged.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("-sync y"));

        let listing = fs::read_to_string(scripts.join("ANI_L0_000.cmds")).unwrap();
        assert_eq!(listing, "nucmer 0\nnucmer 1\n");
        assert!(scripts.join("ANI_L1_000.sh").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_rejected_submission_is_an_error() {
        let dir = TempDir::new().unwrap();
        let exec = SgeExecutor::new(SgeParams {
            script_dir: dir.path().to_path_buf(),
            qsub: PathBuf::from("false"),
            ..SgeParams::default()
        });
        let result = exec.execute(graph(1));
        assert!(matches!(result, Err(ExecutorError::Scheduler { .. })));
    }
}
