//! Player actions and the LIFO stack holding them
//!
//! The bottom of an [`ActionStack`] is always [`Action::Idle`] and no
//! operation removes it. Only the topmost action drives the player.

use log::error;
use shared::EntityId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Idle,
    /// Following a path at `speed`. The remaining path is owned by the
    /// player's [`Movable`](crate::movable::Movable), not by the action.
    Moving { speed: f32 },
    /// Waiting for the result of movement request number `request`.
    WaitingForPath { request: u64 },
    /// Contributing build points to the given building.
    Building { building: EntityId },
}

#[derive(Debug, Clone)]
pub struct ActionStack {
    actions: Vec<Action>,
}

impl Default for ActionStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionStack {
    pub fn new() -> Self {
        Self {
            actions: vec![Action::Idle],
        }
    }

    pub fn push(&mut self, action: Action) {
        self.actions.push(action);
    }

    /// Removes the topmost action. The Idle floor is never popped, `None`
    /// is returned instead.
    pub fn pop(&mut self) -> Option<Action> {
        if self.actions.len() > 1 {
            self.actions.pop()
        } else {
            None
        }
    }

    pub fn peek(&self) -> &Action {
        match self.actions.last() {
            Some(action) => action,
            None => {
                error!("Action stack is empty, it should always hold Idle at the bottom");
                panic!("empty action stack");
            }
        }
    }

    /// Pops everything but the bottommost Idle action.
    pub fn clear(&mut self) {
        self.actions.truncate(1);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn bottom(&self) -> Option<&Action> {
        self.actions.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stack_holds_idle() {
        let stack = ActionStack::new();
        assert_eq!(stack.len(), 1);
        assert_eq!(*stack.peek(), Action::Idle);
        assert_eq!(stack.bottom(), Some(&Action::Idle));
    }

    #[test]
    fn test_idle_floor_is_never_popped() {
        let mut stack = ActionStack::new();
        stack.push(Action::Moving { speed: 1.0 });

        assert_eq!(stack.pop(), Some(Action::Moving { speed: 1.0 }));
        assert_eq!(stack.pop(), None);
        assert_eq!(stack.pop(), None);
        assert_eq!(stack.len(), 1);
        assert_eq!(*stack.peek(), Action::Idle);
    }

    #[test]
    fn test_clear_keeps_idle() {
        let mut stack = ActionStack::new();
        stack.push(Action::Building { building: 4 });
        stack.push(Action::Moving { speed: 2.0 });
        stack.push(Action::WaitingForPath { request: 1 });
        assert_eq!(stack.len(), 4);

        stack.clear();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.bottom(), Some(&Action::Idle));
    }

    #[test]
    fn test_top_governs() {
        let mut stack = ActionStack::new();
        stack.push(Action::Building { building: 9 });
        stack.push(Action::WaitingForPath { request: 3 });
        assert_eq!(*stack.peek(), Action::WaitingForPath { request: 3 });

        assert_eq!(stack.pop(), Some(Action::WaitingForPath { request: 3 }));
        assert_eq!(*stack.peek(), Action::Building { building: 9 });
    }
}
