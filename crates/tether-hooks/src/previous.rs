#![forbid(unsafe_code)]

//! Remembers the value a [`State`] held before its latest change.

use std::cell::RefCell;
use std::rc::Rc;

use tether_runtime::{State, Watch};

struct Track<T> {
    last: T,
    previous: Option<T>,
}

/// Previous value of an upstream state. `None` until the first change.
pub struct Previous<T> {
    track: Rc<RefCell<Track<T>>>,
    _watch: Watch,
}

impl<T: Clone + PartialEq + 'static> Previous<T> {
    /// Start tracking `source`.
    #[must_use]
    pub fn new(source: &State<T>) -> Self {
        let track = Rc::new(RefCell::new(Track {
            last: source.get(),
            previous: None,
        }));
        let t = Rc::clone(&track);
        let watch = source.watch(move |value| {
            let mut track = t.borrow_mut();
            let last = std::mem::replace(&mut track.last, value.clone());
            track.previous = Some(last);
        });
        Self {
            track,
            _watch: watch,
        }
    }

    /// Value `source` held before its latest change.
    #[must_use]
    pub fn previous(&self) -> Option<T> {
        self.track.borrow().previous.clone()
    }
}
