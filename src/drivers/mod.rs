// Wait primitives that cooperate with the fiber scheduler.
//
// Board-independent; they wrap embedded-hal traits and call the idle
// hook while they wait.

pub mod delay;
