use std::sync::Arc;

use crate::model::ChurchProfile;

/// Published state of a list repository.
///
/// `items` is shared so that cloning a snapshot for every subscriber stays cheap.
#[derive(Debug, Clone)]
pub struct ListState<T> {
    pub items: Arc<Vec<T>>,
    pub selected: Option<T>,
    pub loading: bool,
    /// Blocking failure, or the "using cached data" notice after a fallback.
    pub error: Option<String>,
}

impl<T> Default for ListState<T> {
    fn default() -> Self {
        Self {
            items: Arc::new(Vec::new()),
            selected: None,
            loading: false,
            error: None,
        }
    }
}

impl<T> ListState<T> {
    pub fn view(&self) -> ViewState<Arc<Vec<T>>> {
        ViewState::derive(
            self.loading,
            (!self.items.is_empty()).then(|| Arc::clone(&self.items)),
            self.error.as_deref(),
            || Arc::new(Vec::new()),
        )
    }
}

/// Published state of the profile repository.
#[derive(Debug, Clone, Default)]
pub struct ProfileState {
    pub profile: Option<ChurchProfile>,
    pub loading: bool,
    pub error: Option<String>,
}

impl ProfileState {
    /// `Ready` carries `None` when the sheet simply has no profile row.
    pub fn view(&self) -> ViewState<Option<ChurchProfile>> {
        ViewState::derive(
            self.loading,
            self.profile.clone().map(Some),
            self.error.as_deref(),
            || None,
        )
    }
}

/// What a screen should render for one record kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState<T> {
    /// First load in flight with nothing to show yet.
    Loading,
    /// Data to show, with an optional non-blocking notice (stale cache).
    Ready { data: T, notice: Option<String> },
    /// Nothing to show; render a retry affordance.
    Failed { message: String },
}

impl<T> ViewState<T> {
    /// Data wins over errors. Without data: loading, then failure, then a
    /// legitimately empty result.
    fn derive(
        loading: bool,
        data: Option<T>,
        error: Option<&str>,
        empty: impl FnOnce() -> T,
    ) -> Self {
        match (data, error) {
            (Some(data), notice) => ViewState::Ready {
                data,
                notice: notice.map(str::to_string),
            },
            (None, _) if loading => ViewState::Loading,
            (None, Some(message)) => ViewState::Failed {
                message: message.to_string(),
            },
            (None, None) => ViewState::Ready {
                data: empty(),
                notice: None,
            },
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, ViewState::Loading)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            ViewState::Ready { data, .. } => Some(data),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_list_state_is_empty_ready() {
        let state = ListState::<u32>::default();
        assert_eq!(
            state.view(),
            ViewState::Ready {
                data: Arc::new(vec![]),
                notice: None
            }
        );
    }

    #[test]
    fn test_loading_without_data() {
        let state = ListState::<u32> {
            loading: true,
            ..Default::default()
        };
        assert!(state.view().is_loading());
    }

    #[test]
    fn test_data_with_notice_is_ready() {
        let state = ListState {
            items: Arc::new(vec![1, 2]),
            loading: true,
            error: Some("Using cached data. timeout".into()),
            ..Default::default()
        };
        match state.view() {
            ViewState::Ready { data, notice } => {
                assert_eq!(*data, vec![1, 2]);
                assert_eq!(notice.as_deref(), Some("Using cached data. timeout"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_error_without_data_fails() {
        let state = ListState::<u32> {
            error: Some("Google Sheets URL not configured".into()),
            ..Default::default()
        };
        assert_eq!(
            state.view(),
            ViewState::Failed {
                message: "Google Sheets URL not configured".into()
            }
        );
        assert_eq!(state.view().data(), None);
    }

    #[test]
    fn test_profile_view() {
        let mut state = ProfileState::default();
        assert_eq!(state.view().data(), Some(&None));

        state.loading = true;
        assert!(state.view().is_loading());

        state.profile = Some(ChurchProfile {
            name: "Grace".into(),
            ..Default::default()
        });
        assert_eq!(
            state.view().data().and_then(|p| p.as_ref()).map(|p| p.name.as_str()),
            Some("Grace")
        );
    }
}
