//! Integration Tests Module
//!
//! Exercises devpilot through its public API: intent routing into planning
//! or the ReAct loop, guarded shell execution with interactive approval,
//! file-backed tools, and many sessions sharing one orchestrator.

// Routing, planning and configuration through the orchestrator
mod end_to_end_test;

// ReAct loop against realistic tools
mod react_loop_test;

// Shared registry under concurrent sessions
mod concurrency_test;
