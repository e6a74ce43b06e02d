//! Core library for crewlaunch: crew definitions, the sequential crew runner,
//! the LLM client, agent tools, and the trace-to-UI log adapter.

pub mod adapter;
pub mod crew;
pub mod llm;
pub mod runner;
pub mod tools;
pub mod trace;
