/// The value flowing through a pipeline.
///
/// Most operators are endomorphisms over the application's element type
/// `T` (map, scan, filter, debounce, throttle all publish a single `T`),
/// but `slide` and `partition` publish an accumulated window instead. A
/// single dispatcher instance carries one concrete value type, so rather
/// than threading a different `V` through every stage this wraps both
/// shapes in one enum and lets each operator pick the variant it produces.
#[derive(Clone, Debug)]
pub enum PipeValue<T> {
    Item(T),
    Window(Vec<T>),
}

impl<T> PipeValue<T> {
    #[must_use]
    pub fn as_item(&self) -> Option<&T> {
        match self {
            Self::Item(v) => Some(v),
            Self::Window(_) => None,
        }
    }

    #[must_use]
    pub fn as_window(&self) -> Option<&[T]> {
        match self {
            Self::Window(v) => Some(v),
            Self::Item(_) => None,
        }
    }
}
