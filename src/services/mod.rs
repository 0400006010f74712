pub mod ai_service;
pub mod batch_service;
pub mod grading_service;
pub mod quiz_service;
pub mod result_service;
