mod smoke_tests;

// This file organizes the integration tests into a cohesive test suite.
// Each module tests a specific aspect of the application:
// - smoke_tests: configuration, default regions and the command shell
// - session_tests: token pickup, persistence and sign-out
// - event_sync_mock: event loading, filters and edits against a mocked backend
// - rsvp_mock: attendance and calendar actions against a mocked backend
