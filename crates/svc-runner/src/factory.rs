use svc_runner_core::ServiceHostFactory;

/// Platform-independent factory that selects the host implementation at compile time
pub struct PlatformServiceHostFactory;

#[cfg(any(unix, windows))]
impl ServiceHostFactory for PlatformServiceHostFactory {
    #[cfg(unix)]
    type Host = svc_runner_unix::SystemdServiceHost;

    #[cfg(windows)]
    type Host = svc_runner_windows::WindowsServiceHost;

    fn create_host() -> Self::Host {
        #[cfg(unix)]
        return svc_runner_unix::SystemdServiceHostFactory::create_host();

        #[cfg(windows)]
        return svc_runner_windows::WindowsServiceHostFactory::create_host();
    }

    fn platform_name() -> &'static str {
        #[cfg(unix)]
        return svc_runner_unix::SystemdServiceHostFactory::platform_name();

        #[cfg(windows)]
        return svc_runner_windows::WindowsServiceHostFactory::platform_name();
    }
}
