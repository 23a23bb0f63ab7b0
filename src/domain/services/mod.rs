pub mod connection_transitions;
