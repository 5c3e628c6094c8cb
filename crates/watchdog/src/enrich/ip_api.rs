//! ip-api.com 위치 정보 조회
//!
//! `GET {base_url}/json/{ip}?fields={fields_id}`로 조회하고,
//! 응답을 [`enrichment_keys`] 고정 키 집합으로 변환합니다.
//!
//! # 캐시
//! IP별 결과를 `cache_ttl_secs` 동안 메모리에 보관합니다.
//! 항목 수가 `cache_max_entries`에 도달하면 가장 오래된 항목을 제거합니다.
//! API가 명확히 답한 `status = "fail"`(사설/예약 대역 등)도 캐시하지만,
//! 전송 에러, 200 이외의 응답, 디코딩 실패는 캐시하지 않습니다.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use intrusion_monitor_core::config::EnrichmentConfig;
use intrusion_monitor_core::error::EnrichmentError;
use intrusion_monitor_core::pipeline::EnrichmentGateway;
use intrusion_monitor_core::types::{Enrichment, enrichment_keys};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

/// geohash 정밀도 (문자 수)
pub const GEOHASH_PRECISION: usize = 12;

/// API 성공 상태 문자열
const STATUS_SUCCESS: &str = "success";

/// ip-api.com JSON 응답
///
/// `fields` 파라미터로 요청하지 않은 필드는 응답에 없으므로 모두 선택적입니다.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IpApiResponse {
    status: String,
    message: Option<String>,
    continent: Option<String>,
    continent_code: Option<String>,
    country: Option<String>,
    country_code: Option<String>,
    region: Option<String>,
    region_name: Option<String>,
    city: Option<String>,
    district: Option<String>,
    zip: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    timezone: Option<String>,
    isp: Option<String>,
    org: Option<String>,
    #[serde(rename = "as")]
    as_number: Option<String>,
    asname: Option<String>,
    mobile: Option<bool>,
    proxy: Option<bool>,
    hosting: Option<bool>,
}

impl IpApiResponse {
    fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }

    /// 응답을 고정 키 집합의 위치 정보로 변환합니다.
    fn into_enrichment(self, ip: &str) -> Enrichment {
        let mut e = Enrichment::new();

        let strings = [
            (enrichment_keys::CONTINENT, self.continent),
            (enrichment_keys::CONTINENT_CODE, self.continent_code),
            (enrichment_keys::COUNTRY, self.country),
            (enrichment_keys::COUNTRY_CODE, self.country_code),
            (enrichment_keys::REGION, self.region),
            (enrichment_keys::REGION_NAME, self.region_name),
            (enrichment_keys::CITY, self.city),
            (enrichment_keys::DISTRICT, self.district),
            (enrichment_keys::ZIP, self.zip),
            (enrichment_keys::TIMEZONE, self.timezone),
            (enrichment_keys::ISP, self.isp),
            (enrichment_keys::ORG, self.org),
            (enrichment_keys::AS, self.as_number),
            (enrichment_keys::ASNAME, self.asname),
        ];
        for (key, value) in strings {
            if let Some(value) = value {
                e.insert(key, value);
            }
        }

        let flags = [
            (enrichment_keys::MOBILE, self.mobile),
            (enrichment_keys::PROXY, self.proxy),
            (enrichment_keys::HOSTING, self.hosting),
        ];
        for (key, value) in flags {
            if let Some(value) = value {
                e.insert(key, value.to_string());
            }
        }

        if let Some(lat) = self.lat {
            e.insert(enrichment_keys::LATITUDE, lat.to_string());
        }
        if let Some(lon) = self.lon {
            e.insert(enrichment_keys::LONGITUDE, lon.to_string());
        }
        if let (Some(lat), Some(lon)) = (self.lat, self.lon) {
            match geohash::encode(geohash::Coord { x: lon, y: lat }, GEOHASH_PRECISION) {
                Ok(hash) => {
                    tracing::debug!(ip, lat, lon, geohash = %hash, "geohash computed");
                    e.insert(enrichment_keys::GEOHASH, hash);
                }
                Err(err) => {
                    tracing::debug!(ip, lat, lon, error = %err, "unable to compute geohash");
                }
            }
        }

        e
    }
}

/// 캐시 항목
#[derive(Debug, Clone)]
struct CacheEntry {
    /// `None`은 API가 명확히 실패를 답한 경우
    value: Option<Enrichment>,
    inserted_at: Instant,
}

/// TTL과 최대 항목 수를 가진 IP별 조회 캐시
#[derive(Debug)]
struct LookupCache {
    ttl: Duration,
    max_entries: usize,
    entries: HashMap<String, CacheEntry>,
}

impl LookupCache {
    fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            entries: HashMap::new(),
        }
    }

    fn is_enabled(&self) -> bool {
        self.max_entries > 0 && !self.ttl.is_zero()
    }

    /// 유효한 항목을 반환합니다. 만료된 항목은 제거합니다.
    fn get(&mut self, ip: &str, now: Instant) -> Option<Option<Enrichment>> {
        let entry = self.entries.get(ip)?;
        if now.saturating_duration_since(entry.inserted_at) < self.ttl {
            return Some(entry.value.clone());
        }
        self.entries.remove(ip);
        None
    }

    fn insert(&mut self, ip: &str, value: Option<Enrichment>, now: Instant) {
        if !self.is_enabled() {
            return;
        }

        if !self.entries.contains_key(ip) && self.entries.len() >= self.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
            }
        }

        self.entries.insert(
            ip.to_owned(),
            CacheEntry {
                value,
                inserted_at: now,
            },
        );
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// ip-api.com 게이트웨이
pub struct IpApiGateway {
    client: Client,
    base_url: String,
    fields_id: u64,
    cache: Mutex<LookupCache>,
}

impl IpApiGateway {
    /// 설정에서 게이트웨이를 생성합니다.
    pub fn new(config: &EnrichmentConfig) -> Result<Self, EnrichmentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EnrichmentError::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            fields_id: config.fields_id,
            cache: Mutex::new(LookupCache::new(
                Duration::from_secs(config.cache_ttl_secs),
                config.cache_max_entries,
            )),
        })
    }

    /// 조회 URL을 반환합니다 (쿼리 파라미터 제외).
    pub fn lookup_url(&self, ip: &str) -> String {
        format!("{}/json/{ip}", self.base_url)
    }

    /// 현재 캐시된 IP 수를 반환합니다.
    pub fn cached_entries(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    /// API를 호출하여 위치 정보를 가져옵니다.
    ///
    /// `status != "success"`는 [`EnrichmentError::Api`]로 반환됩니다.
    pub async fn fetch(&self, ip: &str) -> Result<Enrichment, EnrichmentError> {
        let url = self.lookup_url(ip);
        tracing::debug!(url = %url, fields = self.fields_id, "requesting ip geolocation");

        let resp = self
            .client
            .get(&url)
            .query(&[("fields", self.fields_id)])
            .send()
            .await
            .map_err(|e| EnrichmentError::Http(e.to_string()))?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(EnrichmentError::Status(status.as_u16()));
        }

        let body: IpApiResponse = resp
            .json()
            .await
            .map_err(|e| EnrichmentError::Decode(e.to_string()))?;

        if !body.is_success() {
            return Err(EnrichmentError::Api {
                status: body.status,
                message: body.message.unwrap_or_default(),
            });
        }

        Ok(body.into_enrichment(ip))
    }

    fn cache_get(&self, ip: &str) -> Option<Option<Enrichment>> {
        self.cache
            .lock()
            .ok()
            .and_then(|mut cache| cache.get(ip, Instant::now()))
    }

    fn cache_put(&self, ip: &str, value: Option<Enrichment>) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(ip, value, Instant::now());
        }
    }
}

impl EnrichmentGateway for IpApiGateway {
    fn name(&self) -> &str {
        "ip-api"
    }

    async fn lookup(&self, ip: &str) -> Option<Enrichment> {
        if let Some(cached) = self.cache_get(ip) {
            tracing::debug!(ip, hit = cached.is_some(), "geolocation served from cache");
            return cached;
        }

        match self.fetch(ip).await {
            Ok(enrichment) => {
                tracing::debug!(ip, attributes = enrichment.len(), "geolocation found");
                self.cache_put(ip, Some(enrichment.clone()));
                Some(enrichment)
            }
            Err(err @ EnrichmentError::Api { .. }) => {
                tracing::info!(ip, error = %err, "no geolocation available for ip");
                self.cache_put(ip, None);
                None
            }
            Err(err) => {
                tracing::error!(ip, error = %err, "geolocation lookup failed");
                None
            }
        }
    }
}
