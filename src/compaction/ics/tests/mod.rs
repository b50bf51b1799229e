mod tests_gc;
