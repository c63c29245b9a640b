mod blocking_test;
mod merge_test;
mod pipeline_test;
