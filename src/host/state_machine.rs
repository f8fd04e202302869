// Generic state-machine scheduler driving a character's state table.
use std::collections::HashMap;

use bevy::prelude::*;

use crate::state_table::{CoroutineStep, StateCoroutine, StateTable, UpdateFn};

/// Runs in place of a state's update function. Receives the original so it can fall back.
pub type UpdateHook<C> = fn(&mut C, UpdateFn<C>) -> usize;

pub struct StateMachine<C> {
    table: StateTable<C>,
    update_hooks: HashMap<usize, UpdateHook<C>>,
    coroutine: Option<Box<dyn StateCoroutine<C>>>,
    state: usize,
    previous_state: usize,
    transitions: u64,
}

impl<C> StateMachine<C> {
    pub fn new(states: usize, capacity: usize) -> Self {
        Self {
            table: StateTable::new(states, capacity),
            update_hooks: HashMap::new(),
            coroutine: None,
            state: 0,
            previous_state: 0,
            transitions: 0,
        }
    }

    pub fn state(&self) -> usize {
        self.state
    }

    pub fn previous_state(&self) -> usize {
        self.previous_state
    }

    pub fn table(&self) -> &StateTable<C> {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut StateTable<C> {
        &mut self.table
    }

    pub fn has_coroutine(&self) -> bool {
        self.coroutine.is_some()
    }

    /// Intercept the update of `state`. Returns the hook it replaced, if any.
    pub fn hook_update(&mut self, state: usize, hook: UpdateHook<C>) -> Option<UpdateHook<C>> {
        self.update_hooks.insert(state, hook)
    }
}

/// Implemented by anything that owns a [`StateMachine`] over itself.
///
/// Callbacks take the owner by `&mut`, so transitions and ticks are driven
/// from here rather than from the machine.
pub trait StateMachineOwner: Sized {
    fn state_machine(&self) -> &StateMachine<Self>;
    fn state_machine_mut(&mut self) -> &mut StateMachine<Self>;

    /// Switch states, running the old end and the new begin and starting the new coroutine.
    fn set_state(&mut self, next: usize) {
        let machine = self.state_machine();
        if next == machine.state {
            return;
        }
        if next >= machine.table.len() {
            error!(
                state = next,
                len = machine.table.len(),
                "ignoring transition to unknown state"
            );
            return;
        }

        let end = machine.table.end(machine.state);
        if let Some(end) = end {
            end(self);
        }

        let machine = self.state_machine_mut();
        machine.previous_state = machine.state;
        machine.state = next;
        machine.transitions += 1;
        machine.coroutine = None;
        let transitions = machine.transitions;
        let begin = machine.table.begin(next);
        let coroutine = machine.table.coroutine(next);

        if let Some(begin) = begin {
            begin(self);
        }
        // A begin callback that transitions again owns the coroutine slot from then on.
        if self.state_machine().transitions != transitions {
            return;
        }
        if let Some(coroutine) = coroutine {
            let body = coroutine(self);
            self.state_machine_mut().coroutine = Some(body);
        }
    }

    /// One simulation tick: run the (possibly hooked) update, then resume the coroutine.
    fn tick_state_machine(&mut self) {
        let machine = self.state_machine();
        let state = machine.state;
        let update = machine.table.update(state);
        let hook = machine.update_hooks.get(&state).copied();
        if let Some(update) = update {
            let next = match hook {
                Some(hook) => hook(self, update),
                None => update(self),
            };
            self.set_state(next);
        }

        let before = self.state_machine().transitions;
        let Some(mut body) = self.state_machine_mut().coroutine.take() else {
            return;
        };
        let step = body.resume(self);
        let machine = self.state_machine_mut();
        if step == CoroutineStep::Yield && machine.transitions == before {
            machine.coroutine = Some(body);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDLE: usize = 0;
    const WINDUP: usize = 1;
    const RELEASE: usize = 2;

    struct Actor {
        machine: StateMachine<Actor>,
        log: Vec<&'static str>,
        go: bool,
    }

    impl StateMachineOwner for Actor {
        fn state_machine(&self) -> &StateMachine<Self> {
            &self.machine
        }

        fn state_machine_mut(&mut self) -> &mut StateMachine<Self> {
            &mut self.machine
        }
    }

    struct Windup {
        ticks: u32,
    }

    impl StateCoroutine<Actor> for Windup {
        fn resume(&mut self, owner: &mut Actor) -> CoroutineStep {
            self.ticks += 1;
            owner.log.push("windup-resume");
            if self.ticks < 2 {
                return CoroutineStep::Yield;
            }
            owner.set_state(RELEASE);
            CoroutineStep::Done
        }
    }

    fn idle_update(actor: &mut Actor) -> usize {
        if actor.go { WINDUP } else { IDLE }
    }

    fn windup_update(_: &mut Actor) -> usize {
        WINDUP
    }

    fn release_update(_: &mut Actor) -> usize {
        RELEASE
    }

    fn windup_begin(actor: &mut Actor) {
        actor.log.push("windup-begin");
    }

    fn idle_end(actor: &mut Actor) {
        actor.log.push("idle-end");
    }

    fn windup_body(_: &mut Actor) -> Box<dyn StateCoroutine<Actor>> {
        Box::new(Windup { ticks: 0 })
    }

    fn actor() -> Actor {
        let mut machine = StateMachine::new(3, 4);
        let table = machine.table_mut();
        table.set_callbacks(IDLE, Some(idle_update), None, None, Some(idle_end));
        table.set_callbacks(
            WINDUP,
            Some(windup_update),
            Some(windup_body),
            Some(windup_begin),
            None,
        );
        table.set_callbacks(RELEASE, Some(release_update), None, None, None);
        Actor {
            machine,
            log: Vec::new(),
            go: false,
        }
    }

    #[test]
    fn coroutine_starts_on_the_entry_tick() {
        let mut a = actor();
        a.go = true;
        a.tick_state_machine();
        assert_eq!(a.machine.state(), WINDUP);
        assert_eq!(a.machine.previous_state(), IDLE);
        assert_eq!(a.log, vec!["idle-end", "windup-begin", "windup-resume"]);
        assert!(a.machine.has_coroutine());

        a.tick_state_machine();
        assert_eq!(a.machine.state(), RELEASE);
        assert_eq!(a.machine.previous_state(), WINDUP);
        assert!(!a.machine.has_coroutine());
    }

    #[test]
    fn setting_the_current_state_is_a_no_op() {
        let mut a = actor();
        a.set_state(IDLE);
        assert!(a.log.is_empty());
    }

    #[test]
    fn unknown_states_are_ignored() {
        let mut a = actor();
        a.set_state(9);
        assert_eq!(a.machine.state(), IDLE);
    }

    #[test]
    fn hooks_run_instead_of_the_update() {
        fn force_release(_: &mut Actor, _orig: UpdateFn<Actor>) -> usize {
            RELEASE
        }
        fn passthrough(actor: &mut Actor, orig: UpdateFn<Actor>) -> usize {
            actor.log.push("hooked");
            orig(actor)
        }

        let mut a = actor();
        assert!(a.machine.hook_update(IDLE, passthrough).is_none());
        a.tick_state_machine();
        assert_eq!(a.machine.state(), IDLE);
        assert_eq!(a.log, vec!["hooked"]);

        assert!(a.machine.hook_update(IDLE, force_release).is_some());
        a.tick_state_machine();
        assert_eq!(a.machine.state(), RELEASE);
    }
}
