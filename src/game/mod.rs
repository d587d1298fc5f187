pub mod chart;
pub mod flow;
pub mod judgment;
pub mod lane;
pub mod npc;
pub mod player;
pub mod rhythm;
