//! Prune net signals that no longer have any registered element

use sch_core::command::{CommandError, CommandGroup, UndoCommand};
use sch_core::commands::NetSignalRemove;
use sch_core::project::Project;
use uuid::Uuid;

/// Remove every net signal without registered schematic segments, board
/// elements or component signals. Composite commands run this as their last
/// step so that merges and removals never leave orphaned signals behind.
pub struct RemoveUnusedNetSignals {
    group: CommandGroup,
}

impl RemoveUnusedNetSignals {
    pub fn new() -> Self {
        Self {
            group: CommandGroup::new("Remove unused net signals"),
        }
    }

    fn run(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        let unused: Vec<Uuid> = project
            .circuit
            .net_signals()
            .iter()
            .filter(|signal| !signal.is_used())
            .map(|signal| signal.uuid)
            .collect();
        for signal in unused {
            self.group
                .exec_new_child(project, Box::new(NetSignalRemove::new(signal)))?;
        }
        Ok(self.group.child_count() > 0)
    }
}

impl Default for RemoveUnusedNetSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl UndoCommand for RemoveUnusedNetSignals {
    fn text(&self) -> &str {
        "Remove unused net signals"
    }

    fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        match self.run(project) {
            Ok(modified) => Ok(modified),
            Err(e) => {
                self.group.rollback(project)?;
                Err(e)
            }
        }
    }

    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        self.group.undo_children(project)
    }

    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        self.group.redo_children(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testbench::*;

    #[test]
    fn test_prunes_only_unused_signals() {
        let (mut project, sheet) = project_with_sheet();
        let used = add_signal(&mut project, "USED");
        let unused = add_signal(&mut project, "UNUSED");
        add_chain(&mut project, sheet, used, &[(0.0, 0.0), (5.0, 0.0)]);

        let mut cmd = RemoveUnusedNetSignals::new();
        assert!(cmd.perform_execute(&mut project).unwrap());
        assert!(project.circuit.net_signal(used).is_some());
        assert!(project.circuit.net_signal(unused).is_none());

        cmd.perform_undo(&mut project).unwrap();
        assert!(project.circuit.net_signal(unused).is_some());
    }

    #[test]
    fn test_noop_when_everything_used() {
        let (mut project, sheet) = project_with_sheet();
        let used = add_signal(&mut project, "USED");
        add_chain(&mut project, sheet, used, &[(0.0, 0.0), (5.0, 0.0)]);
        let mut cmd = RemoveUnusedNetSignals::new();
        assert!(!cmd.perform_execute(&mut project).unwrap());
    }
}
