use serde::Serialize;
use std::fmt;
use std::path::Path;

/// How the processes of a task are launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProcessType {
    /// Processes are started as one MPI job.
    #[serde(rename = "MPI")]
    Mpi,
}

/// Threading model used inside each process of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ThreadType {
    #[serde(rename = "OpenMP")]
    OpenMp,
    #[serde(rename = "CUDA")]
    Cuda,
}

/// Hardware requested by a task for one kind of device.
///
/// The execution collaborator interprets these numbers; the core never schedules anything
/// itself. A record with `process_count == 0` requests nothing of that device type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceRequirements {
    pub process_count: usize,
    pub process_type: Option<ProcessType>,
    pub threads_per_process: usize,
    pub thread_type: Option<ThreadType>,
}

impl ResourceRequirements {
    pub fn none() -> Self {
        Self {
            process_count: 0,
            process_type: None,
            threads_per_process: 0,
            thread_type: None,
        }
    }

    pub fn cpu(processes: usize, threads_per_process: usize) -> Self {
        Self {
            process_count: processes,
            process_type: None,
            threads_per_process,
            thread_type: Some(ThreadType::OpenMp),
        }
    }

    pub fn gpu(processes: usize) -> Self {
        Self {
            process_count: processes,
            process_type: None,
            threads_per_process: 1,
            thread_type: Some(ThreadType::Cuda),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.process_count == 0
    }
}

impl Default for ResourceRequirements {
    fn default() -> Self {
        Self::none()
    }
}

/// A single, opaque unit of delegated work.
///
/// Descriptors are produced by task managers, grouped into a stage and handed to the execution
/// collaborator. They are immutable once built: every field is only reachable through a getter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskDescriptor {
    name: String,
    executable: String,
    arguments: Vec<String>,
    pre_exec: Vec<String>,
    cpu: ResourceRequirements,
    gpu: Option<ResourceRequirements>,
}

impl TaskDescriptor {
    pub fn builder(name: impl Into<String>, executable: impl Into<String>) -> TaskDescriptorBuilder {
        TaskDescriptorBuilder::new(name, executable)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn pre_exec(&self) -> &[String] {
        &self.pre_exec
    }

    pub fn cpu(&self) -> &ResourceRequirements {
        &self.cpu
    }

    pub fn gpu(&self) -> Option<&ResourceRequirements> {
        self.gpu.as_ref()
    }

    /// Looks up the value following `flag` in the argument list.
    pub fn argument_value(&self, flag: &str) -> Option<&str> {
        self.arguments
            .windows(2)
            .find(|pair| pair[0] == flag)
            .map(|pair| pair[1].as_str())
    }

    /// Renders the setup commands and the main command as a single shell script.
    pub fn to_shell_script(&self) -> String {
        let mut command = shell_quote(&self.executable);
        for argument in &self.arguments {
            command.push(' ');
            command.push_str(&shell_quote(argument));
        }
        let mut lines: Vec<&str> = self.pre_exec.iter().map(String::as_str).collect();
        lines.push(&command);
        lines.join(" && ")
    }
}

impl fmt::Display for TaskDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.name, self.executable, self.arguments.join(" "))
    }
}

/// Quotes `value` for a POSIX shell unless it only contains safe characters.
pub fn shell_quote(value: &str) -> String {
    let is_plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@,+%".contains(c));
    if is_plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

#[derive(Debug, Clone)]
pub struct TaskDescriptorBuilder {
    name: String,
    executable: String,
    arguments: Vec<String>,
    pre_exec: Vec<String>,
    cpu: ResourceRequirements,
    gpu: Option<ResourceRequirements>,
}

impl TaskDescriptorBuilder {
    pub fn new(name: impl Into<String>, executable: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            executable: executable.into(),
            arguments: Vec::new(),
            pre_exec: Vec::new(),
            cpu: ResourceRequirements::cpu(1, 1),
            gpu: None,
        }
    }

    /// Appends a bare positional argument, e.g. the script an interpreter should run.
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.arguments.push(value.into());
        self
    }

    /// Appends a `flag value` pair, preserving insertion order.
    pub fn flag(mut self, flag: &str, value: impl ToString) -> Self {
        self.arguments.push(flag.to_string());
        self.arguments.push(value.to_string());
        self
    }

    pub fn path_flag(self, flag: &str, path: &Path) -> Self {
        let value = path.display().to_string();
        self.flag(flag, value)
    }

    pub fn pre_exec(mut self, command: impl Into<String>) -> Self {
        self.pre_exec.push(command.into());
        self
    }

    pub fn pre_exec_all<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pre_exec.extend(commands.into_iter().map(Into::into));
        self
    }

    pub fn cpu(mut self, requirements: ResourceRequirements) -> Self {
        self.cpu = requirements;
        self
    }

    pub fn gpu(mut self, requirements: Option<ResourceRequirements>) -> Self {
        self.gpu = requirements.filter(|r| !r.is_empty());
        self
    }

    pub fn build(self) -> TaskDescriptor {
        TaskDescriptor {
            name: self.name,
            executable: self.executable,
            arguments: self.arguments,
            pre_exec: self.pre_exec,
            cpu: self.cpu,
            gpu: self.gpu,
        }
    }
}
