/// Tasks that run one after another, in order.
#[derive(Debug, Clone)]
pub struct Stage<T> {
    pub tasks: Vec<T>,
}

impl<T> Stage<T> {
    pub fn sequential(tasks: Vec<T>) -> Self {
        Self { tasks }
    }
}
