//! Undo command contract, transaction groups and the undo stack
//!
//! Every document mutation is a command with three entry points:
//! `perform_execute` runs the action the first time and reports whether the
//! document was actually modified, `perform_undo` restores the prior state,
//! and `perform_redo` re-applies it. A command is executed at most once from
//! its initial state; afterwards only undo/redo alternate.
//!
//! Composite commands collect child commands in a [`CommandGroup`]. The
//! group is an explicit transaction object: if any child fails, the driver
//! rolls back every already-applied child in reverse order, leaving the
//! document unchanged from the caller's perspective.

use uuid::Uuid;

use crate::board::BoardError;
use crate::circuit::CircuitError;
use crate::project::{Project, ProjectError};
use crate::schematic::SchematicError;

/// A single reversible action on the document
pub trait UndoCommand {
    /// Human-readable description for the undo UI
    fn text(&self) -> &str;

    /// Perform the action the first time. Returns whether the document was
    /// actually modified; unmodified commands are dropped from undo stacks.
    fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError>;

    /// Restore the state from before the last `perform_execute`/`perform_redo`
    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError>;

    /// Re-apply the action after an undo
    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError>;
}

/// Ordered list of child commands executed as one transaction
pub struct CommandGroup {
    text: String,
    children: Vec<Box<dyn UndoCommand>>,
}

impl CommandGroup {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            children: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Execute a new child command immediately. Children that report no
    /// modification are dropped, so they never end up on the undo stack.
    ///
    /// On failure the child itself has not been applied; the caller decides
    /// whether to roll back the already-applied children.
    pub fn exec_new_child(
        &mut self,
        project: &mut Project,
        mut child: Box<dyn UndoCommand>,
    ) -> Result<(), CommandError> {
        if child.perform_execute(project)? {
            self.children.push(child);
        }
        Ok(())
    }

    /// Undo every applied child in reverse order and drop them. Called by
    /// composite drivers when a later step of the transaction failed.
    pub fn rollback(&mut self, project: &mut Project) -> Result<(), CommandError> {
        while let Some(mut child) = self.children.pop() {
            child
                .perform_undo(project)
                .map_err(|e| CommandError::RollbackFailed(e.to_string()))?;
        }
        Ok(())
    }

    pub fn undo_children(&mut self, project: &mut Project) -> Result<(), CommandError> {
        for child in self.children.iter_mut().rev() {
            child.perform_undo(project)?;
        }
        Ok(())
    }

    pub fn redo_children(&mut self, project: &mut Project) -> Result<(), CommandError> {
        for child in self.children.iter_mut() {
            child.perform_redo(project)?;
        }
        Ok(())
    }
}

impl UndoCommand for CommandGroup {
    fn text(&self) -> &str {
        &self.text
    }

    fn perform_execute(&mut self, _project: &mut Project) -> Result<bool, CommandError> {
        // children are appended pre-executed via exec_new_child
        Ok(!self.children.is_empty())
    }

    fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        self.undo_children(project)
    }

    fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
        self.redo_children(project)
    }
}

/// Undo/redo stack for executed commands
pub struct UndoStack {
    commands: Vec<Box<dyn UndoCommand>>,
    /// Number of commands currently applied to the document
    current: usize,
    max_depth: usize,
}

impl UndoStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            commands: Vec::new(),
            current: 0,
            max_depth,
        }
    }

    /// Execute a command and push it if it modified the document. Returns
    /// whether the document was modified.
    pub fn execute(
        &mut self,
        project: &mut Project,
        mut command: Box<dyn UndoCommand>,
    ) -> Result<bool, CommandError> {
        let modified = command.perform_execute(project)?;
        if modified {
            self.commands.truncate(self.current);
            self.commands.push(command);
            self.current += 1;
            if self.commands.len() > self.max_depth {
                self.commands.remove(0);
                self.current -= 1;
            }
        }
        Ok(modified)
    }

    /// Undo the last command. Returns false if there is nothing to undo.
    pub fn undo(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        if self.current == 0 {
            return Ok(false);
        }
        self.commands[self.current - 1].perform_undo(project)?;
        self.current -= 1;
        Ok(true)
    }

    /// Redo the last undone command. Returns false if there is nothing to redo.
    pub fn redo(&mut self, project: &mut Project) -> Result<bool, CommandError> {
        if self.current == self.commands.len() {
            return Ok(false);
        }
        self.commands[self.current].perform_redo(project)?;
        self.current += 1;
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        self.current > 0
    }

    pub fn can_redo(&self) -> bool {
        self.current < self.commands.len()
    }

    pub fn undo_text(&self) -> Option<&str> {
        self.current
            .checked_sub(1)
            .and_then(|i| self.commands.get(i))
            .map(|c| c.text())
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.current = 0;
    }
}

/// Errors raised by command execution.
///
/// Two classes travel this channel: defects (violations of the registration
/// protocol, caller misuse) and recoverable user-facing conditions. Composite
/// commands roll back on either; only [`is_user_error`](Self::is_user_error)
/// conditions are meant to be shown to the user and retried.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Circuit(#[from] CircuitError),
    #[error(transparent)]
    Schematic(#[from] SchematicError),
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error("Schematic not found: {0}")]
    SchematicNotFound(Uuid),
    #[error("Board not found: {0}")]
    BoardNotFound(Uuid),
    #[error("Element is not detached: {0}")]
    NotDetached(Uuid),
    #[error("Component signal still has anchored pins or pads: {0}")]
    SignalStillAnchored(Uuid),
    #[error("{0}")]
    User(String),
    #[error("Rollback failed, document may be inconsistent: {0}")]
    RollbackFailed(String),
}

impl CommandError {
    /// A recoverable condition with a user-facing message
    pub fn user(message: impl Into<String>) -> Self {
        CommandError::User(message.into())
    }

    /// True for recoverable environment/user-data conditions; false for
    /// defects (registration protocol violations, dangling references)
    pub fn is_user_error(&self) -> bool {
        match self {
            CommandError::User(_) => true,
            CommandError::Project(_) => true,
            CommandError::Circuit(CircuitError::NetSignalNameInUse(_)) => true,
            CommandError::Schematic(SchematicError::DuplicateUuid(_)) => true,
            CommandError::Board(BoardError::DuplicateUuid(_)) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test command toggling the project name
    struct SetName {
        text: String,
        new_name: String,
        old_name: Option<String>,
    }

    impl SetName {
        fn new(name: &str) -> Box<Self> {
            Box::new(Self {
                text: "Set name".into(),
                new_name: name.into(),
                old_name: None,
            })
        }
    }

    impl UndoCommand for SetName {
        fn text(&self) -> &str {
            &self.text
        }

        fn perform_execute(&mut self, project: &mut Project) -> Result<bool, CommandError> {
            if project.name == self.new_name {
                return Ok(false);
            }
            self.old_name = Some(project.name.clone());
            self.perform_redo(project)?;
            Ok(true)
        }

        fn perform_undo(&mut self, project: &mut Project) -> Result<(), CommandError> {
            if let Some(old) = &self.old_name {
                project.name = old.clone();
            }
            Ok(())
        }

        fn perform_redo(&mut self, project: &mut Project) -> Result<(), CommandError> {
            project.name = self.new_name.clone();
            Ok(())
        }
    }

    struct FailingCommand;

    impl UndoCommand for FailingCommand {
        fn text(&self) -> &str {
            "Fail"
        }

        fn perform_execute(&mut self, _project: &mut Project) -> Result<bool, CommandError> {
            Err(CommandError::user("boom"))
        }

        fn perform_undo(&mut self, _project: &mut Project) -> Result<(), CommandError> {
            Ok(())
        }

        fn perform_redo(&mut self, _project: &mut Project) -> Result<(), CommandError> {
            Ok(())
        }
    }

    #[test]
    fn test_undo_stack_cursors() {
        let mut project = Project::new("a");
        let mut stack = UndoStack::new(10);

        assert!(stack.execute(&mut project, SetName::new("b")).unwrap());
        assert!(stack.execute(&mut project, SetName::new("c")).unwrap());
        assert_eq!(project.name, "c");
        assert!(stack.can_undo());
        assert!(!stack.can_redo());

        assert!(stack.undo(&mut project).unwrap());
        assert_eq!(project.name, "b");
        assert!(stack.can_redo());

        assert!(stack.redo(&mut project).unwrap());
        assert_eq!(project.name, "c");

        stack.undo(&mut project).unwrap();
        stack.undo(&mut project).unwrap();
        assert_eq!(project.name, "a");
        assert!(!stack.undo(&mut project).unwrap());
    }

    #[test]
    fn test_noop_commands_are_not_pushed() {
        let mut project = Project::new("same");
        let mut stack = UndoStack::new(10);
        assert!(!stack.execute(&mut project, SetName::new("same")).unwrap());
        assert!(!stack.can_undo());
    }

    #[test]
    fn test_redo_branch_cleared_on_new_command() {
        let mut project = Project::new("a");
        let mut stack = UndoStack::new(10);
        stack.execute(&mut project, SetName::new("b")).unwrap();
        stack.undo(&mut project).unwrap();
        stack.execute(&mut project, SetName::new("x")).unwrap();
        assert!(!stack.can_redo());
        assert_eq!(project.name, "x");
    }

    #[test]
    fn test_group_rollback_restores_document() {
        let mut project = Project::new("a");
        let mut group = CommandGroup::new("Grouped edit");
        group.exec_new_child(&mut project, SetName::new("b")).unwrap();
        group.exec_new_child(&mut project, SetName::new("c")).unwrap();
        let err = group.exec_new_child(&mut project, Box::new(FailingCommand));
        assert!(err.is_err());
        group.rollback(&mut project).unwrap();
        assert_eq!(project.name, "a");
        assert_eq!(group.child_count(), 0);
    }

    #[test]
    fn test_error_classification() {
        assert!(CommandError::user("msg").is_user_error());
        assert!(!CommandError::NotDetached(Uuid::new_v4()).is_user_error());
    }
}
