pub mod jobs;
pub mod resumes;

#[cfg(test)]
pub mod memory;
