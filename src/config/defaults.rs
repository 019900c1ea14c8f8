use super::*;

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            auth_base: "https://wattsenergyassistant.b2clogin.com".to_string(),
            tenant: "wattsenergyassistant.onmicrosoft.com".to_string(),
            policy: "b2c_1a_jitmigraion_signup_signin".to_string(),
            client_id: "a19dc71d-697e-451a-86c4-cc112b202c90".to_string(),
            redirect_uri: "msauth.com.seasnve.watts://auth".to_string(),
            scopes: "https://wattsenergyassistant.onmicrosoft.com/a19dc71d-697e-451a-86c4-cc112b202c90/Watts.API openid profile offline_access".to_string(),
            api_base: "https://p.watts-energy.dk".to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: env!("APP_USER_AGENT").to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/tmp/wattson.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            account: AccountConfig::default(),
            endpoints: EndpointsConfig::default(),
            http: HttpConfig::default(),
            logging: LoggingConfig::default(),
            poll_interval_secs: 1800,
            timeseries_interval: Interval::Daily,
            state_file: "/data/wattson_state.json".to_string(),
        }
    }
}
