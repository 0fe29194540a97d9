//! Shared-volume paths for parallel execution
//!
//! Every partition task derives its own input and output directory from
//! `(recipe id, command index, partition id)`, so siblings never coordinate
//! and never write to the same path.
//!
//! All of it lives under a scratch prefix, apart from `<id>/` where a
//! recipe's data is published, so intermediate directories are never
//! published and an interrupted run never looks like published data.

/// Where the shared workflow volume is mounted inside task containers
pub const WORKFLOW_MOUNT: &str = "/mnt/workflow";

/// Volume-relative directory holding every recipe's intermediate data
pub const SCRATCH_PREFIX: &str = ".work";

/// Intermediate data of one parallel run
pub fn scratch_dir(recipe_id: &str) -> String {
    format!("{}/{}/{}", WORKFLOW_MOUNT, SCRATCH_PREFIX, recipe_id)
}

/// Directory fetched inputs are staged in for a parallel run
pub fn inputs_dir(recipe_id: &str) -> String {
    format!("{}/inputs", scratch_dir(recipe_id))
}

/// Glob matching every partition output directory of a command stage
pub fn stage_output_glob(recipe_id: &str, command_index: usize) -> String {
    format!("{}/cmd-{}-partition-*", scratch_dir(recipe_id), command_index)
}

/// Location of one partition task on the shared volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionAddress {
    pub recipe_id: String,
    pub command_index: usize,
    pub partition_id: usize,
}

impl PartitionAddress {
    pub fn new(recipe_id: impl Into<String>, command_index: usize, partition_id: usize) -> Self {
        Self {
            recipe_id: recipe_id.into(),
            command_index,
            partition_id,
        }
    }

    /// The staged inputs for command 0, otherwise the same partition's
    /// output of the previous command
    pub fn input_dir(&self) -> String {
        match self.command_index {
            0 => inputs_dir(&self.recipe_id),
            k => self.dir_for(k - 1),
        }
    }

    pub fn output_dir(&self) -> String {
        self.dir_for(self.command_index)
    }

    pub fn task_name(&self) -> String {
        format!("cmd-{}-partition-{}", self.command_index, self.partition_id)
    }

    fn dir_for(&self, command_index: usize) -> String {
        format!(
            "{}/cmd-{}-partition-{}",
            scratch_dir(&self.recipe_id),
            command_index,
            self.partition_id
        )
    }
}
