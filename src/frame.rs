//! Synthetic frames recorded at every host/guest boundary crossing.
//!
//! The frames of the current thread form a persistent singly linked list.
//! Pushing a frame prepends a link and returns a guard that restores the
//! previous head when dropped. An error captures the head at the moment it
//! is raised, which keeps every frame of its chain alive for as long as the
//! error is, without copying anything.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::registry::{ScriptId, ScriptSource};

/// Which runtime initiated a crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Host,
    Guest,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Host => write!(f, "host"),
            Side::Guest => write!(f, "guest"),
        }
    }
}

/// What kind of crossing a frame records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// A top-level unit run through `Context::eval`
    Script,
    /// A call of a guest function, from either side
    Function,
    /// A guest call of a host callable
    Call,
    /// A guest read of a host property
    Get,
    /// A guest write of a host property
    Set,
}

/// One frame of a traceback.
#[derive(Debug, Clone)]
pub struct SyntheticFrame {
    origin: Side,
    kind: FrameKind,
    name: Option<String>,
    source: Arc<ScriptSource>,
}

impl SyntheticFrame {
    pub fn new(
        origin: Side,
        kind: FrameKind,
        name: Option<String>,
        source: Arc<ScriptSource>,
    ) -> Self {
        Self {
            origin,
            kind,
            name,
            source,
        }
    }

    pub fn origin(&self) -> Side {
        self.origin
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    /// Name of the function, callable or property involved, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Registry identifier of this frame's source.
    pub fn location(&self) -> ScriptId {
        self.source.id()
    }

    /// Synthetic module name the source is registered under.
    pub fn module_name(&self) -> &str {
        self.source.name()
    }

    /// Literal source text of the call site, function or unit.
    pub fn source(&self) -> &str {
        self.source.text()
    }
}

impl fmt::Display for SyntheticFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match (self.kind, &self.name) {
            (FrameKind::Script, _) => "<script>".to_string(),
            (FrameKind::Get, Some(name)) => format!("get {}", name),
            (FrameKind::Set, Some(name)) => format!("set {}", name),
            (_, Some(name)) => name.clone(),
            (_, None) => "<anonymous>".to_string(),
        };
        write!(
            f,
            "  File \"{}\", in {} [{}]",
            self.source.name(),
            label,
            self.origin
        )?;
        let text = self.source.text();
        let first_line = text.lines().next().unwrap_or("").trim();
        if text.lines().nth(1).is_some() {
            write!(f, "\n    {} ...", first_line)
        } else {
            write!(f, "\n    {}", first_line)
        }
    }
}

struct FrameLink {
    frame: SyntheticFrame,
    caller: Option<Rc<FrameLink>>,
}

thread_local! {
    static STACK: RefCell<Option<Rc<FrameLink>>> = const { RefCell::new(None) };
}

/// Pops its frame when dropped.
#[must_use = "the frame is popped as soon as the guard is dropped"]
pub(crate) struct FrameGuard {
    previous: Option<Rc<FrameLink>>,
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        STACK.with(|stack| {
            if let Ok(mut head) = stack.try_borrow_mut() {
                *head = previous;
            }
        });
    }
}

/// Push `frame` as the new innermost frame of this thread.
pub(crate) fn push(frame: SyntheticFrame) -> FrameGuard {
    STACK.with(|stack| {
        let mut head = stack.borrow_mut();
        let previous = head.take();
        *head = Some(Rc::new(FrameLink {
            frame,
            caller: previous.clone(),
        }));
        FrameGuard { previous }
    })
}

/// Capture the current chain.
pub(crate) fn capture() -> Traceback {
    STACK.with(|stack| Traceback {
        head: stack.borrow().clone(),
    })
}

/// Number of frames currently pushed on this thread.
pub fn depth() -> usize {
    capture().len()
}

/// A captured chain of synthetic frames.
#[derive(Clone, Default)]
pub struct Traceback {
    head: Option<Rc<FrameLink>>,
}

impl Traceback {
    pub fn empty() -> Self {
        Self { head: None }
    }

    /// Frames in call order, oldest first.
    pub fn frames(&self) -> Vec<&SyntheticFrame> {
        let mut frames = Vec::new();
        let mut link = self.head.as_deref();
        while let Some(current) = link {
            frames.push(&current.frame);
            link = current.caller.as_deref();
        }
        frames.reverse();
        frames
    }

    /// The frame that was innermost when the chain was captured.
    pub fn innermost(&self) -> Option<&SyntheticFrame> {
        self.head.as_deref().map(|link| &link.frame)
    }

    pub fn len(&self) -> usize {
        let mut len = 0;
        let mut link = self.head.as_deref();
        while let Some(current) = link {
            len += 1;
            link = current.caller.as_deref();
        }
        len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn ptr_eq(&self, other: &Traceback) -> bool {
        match (&self.head, &other.head) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Traceback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Traceback (most recent call last):")?;
        for frame in self.frames() {
            write!(f, "\n{}", frame)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Traceback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.frames().iter().map(|frame| frame.module_name()))
            .finish()
    }
}
