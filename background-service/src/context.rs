use std::collections::HashSet;

/// Content ids this process has already answered.
///
/// Lives for the lifetime of the service only; a restart starts empty.
#[derive(Debug, Default)]
pub struct DispatchContext {
    handled: HashSet<String>,
}

impl DispatchContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_handled(&self, content_id: &str) -> bool {
        self.handled.contains(content_id)
    }

    /// Returns false when the id was already present.
    pub fn mark_handled(&mut self, content_id: &str) -> bool {
        self.handled.insert(content_id.to_string())
    }

    pub fn len(&self) -> usize {
        self.handled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handled.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_handled_is_idempotent() {
        let mut context = DispatchContext::new();
        assert!(context.is_empty());
        assert!(context.mark_handled("abc"));
        assert!(!context.mark_handled("abc"));
        assert!(context.is_handled("abc"));
        assert!(!context.is_handled("def"));
        assert_eq!(context.len(), 1);
    }
}
