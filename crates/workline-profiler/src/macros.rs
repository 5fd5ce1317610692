//! Profiling macros and scope guards.

use workline_core::HighResClock;

use crate::context::Profiler;

/// RAII guard that records a profile entry on drop.
pub struct ScopeGuard<'a> {
    profiler: &'a Profiler,
    name: String,
    begin_tick: u64,
}

impl<'a> ScopeGuard<'a> {
    /// Start timing a scope.
    #[inline]
    #[must_use]
    pub fn new(profiler: &'a Profiler, name: String) -> Self {
        Self {
            profiler,
            name,
            begin_tick: HighResClock::ticks(),
        }
    }
}

impl Drop for ScopeGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        let end_tick = HighResClock::ticks();
        let name = std::mem::take(&mut self.name);
        if let Err(e) = self.profiler.record(name, self.begin_tick, end_tick) {
            tracing::debug!("Profile scope not recorded: {}", e);
        }
    }
}

/// Create a profiling scope that measures execution time until end of scope.
///
/// When the `profiling` feature is disabled, this macro expands to nothing.
///
/// # Examples
///
/// ```ignore
/// use workline_profiler::profile_scope;
///
/// fn build_page(profiler: &Profiler) {
///     profile_scope!(profiler, "build_page");
///     // ... page build code
/// } // timing recorded here
/// ```
#[cfg(feature = "profiling")]
#[macro_export]
macro_rules! profile_scope {
    ($profiler:expr, $name:expr) => {
        let _profile_guard = $profiler.scope($name);
    };
}

#[cfg(not(feature = "profiling"))]
#[macro_export]
macro_rules! profile_scope {
    ($profiler:expr, $name:expr) => {};
}

/// Name of a function item's type, used by [`function_name!`](crate::function_name).
#[doc(hidden)]
#[must_use]
pub fn type_name_of<T>(_: T) -> &'static str {
    std::any::type_name::<T>()
}

/// Path of the enclosing function, e.g. `my_crate::module::function`.
#[macro_export]
macro_rules! function_name {
    () => {{
        fn f() {}
        let name = $crate::type_name_of(f);
        let name = name.strip_suffix("::f").unwrap_or(name);
        name.trim_end_matches("::{{closure}}")
    }};
}

/// Profile the enclosing function under its path, until end of scope.
///
/// Works with any profiler exposing `scope(name)`, such as
/// [`Profiler`](crate::Profiler) or [`FrameProfiler`](crate::FrameProfiler).
/// Expands to nothing when the `profiling` feature is disabled.
///
/// ```ignore
/// fn simulate(frames: &FrameProfiler) {
///     profile_function!(frames);
///     // ...
/// }
/// ```
#[cfg(feature = "profiling")]
#[macro_export]
macro_rules! profile_function {
    ($profiler:expr) => {
        let _profile_guard = $profiler.scope($crate::function_name!());
    };
}

#[cfg(not(feature = "profiling"))]
#[macro_export]
macro_rules! profile_function {
    ($profiler:expr) => {};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ProfilerConfig;

    #[test]
    fn scope_guard_records_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let profiler = Profiler::init(ProfilerConfig {
            output_path: dir.path().join("scope.json"),
            ..ProfilerConfig::default()
        })
        .unwrap();

        {
            let _guard = profiler.scope("outer");
            let _inner = ScopeGuard::new(&profiler, "inner".to_string());
            std::thread::sleep(std::time::Duration::from_millis(1));
        }

        let summary = profiler.shutdown().unwrap();
        assert_eq!(summary.entries_written, 2);
    }

    #[cfg(feature = "profiling")]
    #[test]
    fn profile_scope_macro_records() {
        let dir = tempfile::tempdir().unwrap();
        let profiler = Profiler::init(ProfilerConfig {
            output_path: dir.path().join("macro.json"),
            ..ProfilerConfig::default()
        })
        .unwrap();

        {
            crate::profile_scope!(profiler, "macro");
        }

        assert_eq!(profiler.shutdown().unwrap().entries_written, 1);
    }

    #[test]
    fn function_name_is_the_enclosing_path() {
        fn load_level() -> &'static str {
            crate::function_name!()
        }

        let name = load_level();
        assert!(name.ends_with("::load_level"), "{name}");
        assert!(name.starts_with("workline_profiler::macros::tests"), "{name}");
    }

    #[cfg(feature = "profiling")]
    #[test]
    fn profile_function_macro_names_the_frame_scope() {
        fn step(frames: &crate::FrameProfiler) {
            crate::profile_function!(frames);
        }

        let frames = crate::FrameProfiler::new();
        step(&frames);
        let stats = frames.stats();
        assert_eq!(stats.entries.len(), 1);
        assert!(stats.entries[0].name.ends_with("::step"));
        assert_eq!(stats.entries[0].calls, 1);
    }
}
