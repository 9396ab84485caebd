pub mod blackboard;
pub mod network;
